use std::sync::{Arc, Mutex};

use formats::payload::Collection;
use formats::terrain_bin::{TerrainGrid, TerrainHeader, encode_terrain};
use foundation::math::Vec3;
use foundation::math::origin::{denormalize, remap};
use ingest::{BuildState, IngestConfig, SceneGraphBuilder};
use pretty_assertions::assert_eq;
use scene::components::{Drawable3D, DrawableKind};
use scene::picking::{PickOptions, Ray, pick_ray};
use streaming::io::{FetchError, MemoryFetcher};

const PUMP: &str = r##"{"meshes":[{"name":"body","positions":[[0,0,0],[2,0,0],[0,3,0]],"color":"#ff0000"}]}"##;

fn grid(min_x: f32, min_y: f32) -> Vec<u8> {
    encode_terrain(&TerrainGrid {
        header: TerrainHeader {
            width: 3,
            height: 3,
            min: [min_x, min_y, -120.0],
            max: [min_x + 20.0, min_y + 20.0, -80.0],
        },
        samples: vec![
            -100.0, -101.0, -102.0, //
            -99.0, -100.0, -101.0, //
            -98.0, -99.0, -100.0,
        ],
    })
}

const PAYLOAD: &str = r##"{
    "terrainLayers": {
        "a-north": {"name": "North block", "url": "terrain/north.bin", "seabedStyle": "sand"},
        "b-broken": {"name": "Broken block", "url": "terrain/broken.bin"},
        "c-south": {"name": "South block", "url": "terrain/south.bin", "texture": "textures/south.png"}
    },
    "stagedAssets": {
        "pump-1": {"modelUrl": "models/pump.json", "position": [500100, 6700100, -95], "heading": 90},
        "pump-2": {"modelUrl": "models/pump.json", "position": {"x": 500120, "y": 6700100, "z": -95}, "metadata": {"tag": "P-02"}}
    },
    "shapes": {
        "stray": {"type": "box", "position": [0.005, 0.005, 10], "dimensions": {"width": 1, "height": 1, "depth": 1}}
    },
    "pipes": {
        "broken-record": 42
    }
}"##;

fn fetcher() -> Arc<MemoryFetcher> {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert("payload.json", PAYLOAD.as_bytes().to_vec());
    fetcher.insert("terrain/north.bin", grid(500_000.0, 6_700_000.0));
    fetcher.insert("terrain/south.bin", grid(500_000.0, 6_699_900.0));
    fetcher.fail(
        "terrain/broken.bin",
        FetchError::Http {
            url: "terrain/broken.bin".to_string(),
            status: 503,
        },
    );
    fetcher.insert("models/pump.json", PUMP.as_bytes().to_vec());
    fetcher
}

#[tokio::test]
async fn failing_layer_does_not_stop_the_build() {
    let fetcher = fetcher();
    let progress = Arc::new(Mutex::new(Vec::<(String, f64)>::new()));
    let sink = Arc::clone(&progress);
    let mut builder = SceneGraphBuilder::new(Arc::clone(&fetcher), IngestConfig::default())
        .with_progress(move |message, percent| {
            sink.lock()
                .expect("progress lock")
                .push((message.to_string(), percent))
        });

    let build = builder
        .build_from_url("payload.json")
        .await
        .expect("payload loads");

    assert_eq!(build.state, BuildState::Complete);
    assert_eq!(builder.state(), BuildState::Complete);

    let progress = progress.lock().expect("progress lock");
    assert_eq!(progress.len(), 6);
    assert_eq!(progress[0].1, 10.0);
    assert!(progress.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(progress.last().map(|p| p.1), Some(100.0));
    assert!(
        progress
            .iter()
            .any(|(m, _)| m == "Failed to load terrain layer 'Broken block'")
    );

    let terrain = build.entities(Collection::TerrainLayers);
    assert_eq!(terrain.len(), 2);
    assert_eq!(build.world.drawables_of_kind(DrawableKind::Surface).len(), 2);
    assert_eq!(build.entities(Collection::StagedAssets).len(), 2);
    assert_eq!(build.failed.len(), 1);
    assert_eq!(build.failed[0].id, "b-broken");
    assert_eq!(build.metrics.failed("terrainLayers"), 1);
    assert_eq!(build.metrics.built("stagedAssets"), 2);

    // Stray shape sits on the domain origin and never claims the floating
    // origin; the first terrain layer in id order does.
    assert_eq!(build.entities(Collection::Shapes).len(), 0);
    assert_eq!(build.metrics.counter("shapes.skipped.artifact"), 1);
    assert_eq!(build.world.name(terrain[0]), Some("North block"));
    assert_eq!(
        build.world.transform(terrain[0]).map(|t| t.position),
        Some(Vec3::ZERO)
    );
    assert!(!build.world.render_hints(terrain[0]).frustum_culled);

    assert_eq!(build.quarantined.len(), 1);
    assert_eq!(build.quarantined[0].collection, Collection::Connections);
}

#[tokio::test]
async fn placements_share_one_model_download() {
    let fetcher = fetcher();
    let mut builder = SceneGraphBuilder::new(Arc::clone(&fetcher), IngestConfig::default());
    let mut build = builder.build_from_url("payload.json").await.expect("build");

    assert_eq!(fetcher.requests("models/pump.json"), 1);
    let assets = build.entities(Collection::StagedAssets);
    let models: Vec<_> = assets
        .iter()
        .filter_map(|e| match build.world.drawable(*e) {
            Some(Drawable3D::Model(m)) => Some(Arc::clone(m)),
            _ => None,
        })
        .collect();
    assert_eq!(models.len(), 2);
    assert!(Arc::ptr_eq(&models[0], &models[1]));

    let (first, second) = (assets[0], assets[1]);
    build.world.display_flags_mut(first).wireframe = true;
    assert!(!build.world.display_flags(second).wireframe);

    let p1 = build.world.transform(first).map(|t| t.position).expect("p1");
    let p2 = build.world.transform(second).map(|t| t.position).expect("p2");
    assert!(((p2.x - p1.x) - 20.0).abs() < 1e-6);
    assert_eq!(
        build
            .world
            .properties(second)
            .and_then(|p| p.get("tag")),
        Some("P-02")
    );
}

#[tokio::test]
async fn rebuilding_after_reset_reuses_cached_models() {
    let fetcher = fetcher();
    let mut builder = SceneGraphBuilder::new(Arc::clone(&fetcher), IngestConfig::default());
    let first = builder.build_from_url("payload.json").await.expect("first");
    builder.reset();
    let second = builder.build_from_url("payload.json").await.expect("second");

    assert_eq!(fetcher.requests("models/pump.json"), 1);
    // The broken layer is retried on every build.
    assert_eq!(fetcher.requests("terrain/broken.bin"), 2);
    assert_eq!(first.world.len(), second.world.len());
}

#[tokio::test]
async fn terrain_is_pickable_in_domain_coordinates() {
    let fetcher = fetcher();
    let mut builder = SceneGraphBuilder::new(Arc::clone(&fetcher), IngestConfig::default());
    let build = builder.build_from_url("payload.json").await.expect("build");
    let north = build.entities(Collection::TerrainLayers)[0];

    let ray = Ray::new(Vec3::new(2.5, 50.0, -1.5), Vec3::new(0.0, -1.0, 0.0));
    let hit = pick_ray(&build.world, ray, PickOptions::default()).expect("terrain hit");
    assert_eq!(hit.entity, north);
    assert_eq!(hit.kind, DrawableKind::Surface);
    assert!(
        build
            .world
            .bounds(north)
            .is_some_and(|b| b.contains(hit.point))
    );

    let domain = denormalize(builder.origin(), hit.point);
    assert!((domain.x - 500_012.5).abs() < 1e-6);
    assert!((domain.y - 6_700_011.5).abs() < 1e-6);
    assert!(domain.z < -98.0 && domain.z > -102.0);
}

const HINTED_MODEL: &str = r##"{
    "meshes": [{"positions": [[0,0,0],[1,0,0],[0,1,0]]}],
    "extras": {"center": [400000.0, 7000000.0, -50.0]}
}"##;

fn hinted_fetcher(payload: &str) -> Arc<MemoryFetcher> {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert("payload.json", payload.as_bytes().to_vec());
    fetcher.insert("models/riser.json", HINTED_MODEL.as_bytes().to_vec());
    fetcher
}

#[tokio::test]
async fn model_center_hint_fixes_origin_for_asset_only_scene() {
    let payload = r#"{
        "stagedAssets": {
            "riser": {"modelUrl": "models/riser.json", "position": [400010, 7000020, -50]}
        }
    }"#;
    let mut builder =
        SceneGraphBuilder::new(hinted_fetcher(payload), IngestConfig::default());
    let build = builder.build_from_url("payload.json").await.expect("build");

    assert_eq!(
        builder.origin().get(),
        Some(remap(400_000.0, 7_000_000.0, -50.0))
    );
    let asset = build.entities(Collection::StagedAssets)[0];
    let position = build.world.transform(asset).map(|t| t.position).expect("transform");
    assert!((position - Vec3::new(10.0, 0.0, -20.0)).length() < 1e-6);
}

#[tokio::test]
async fn model_center_hint_does_not_move_an_established_origin() {
    let payload = r#"{
        "shapes": {
            "jacket": {"type": "box", "position": [400500, 7000500, -10], "dimensions": {"width": 1, "height": 1, "depth": 1}}
        },
        "stagedAssets": {
            "riser": {"modelUrl": "models/riser.json", "position": [400010, 7000020, -50]}
        }
    }"#;
    let mut builder =
        SceneGraphBuilder::new(hinted_fetcher(payload), IngestConfig::default());
    let build = builder.build_from_url("payload.json").await.expect("build");

    let shape_origin = remap(400_500.0, 7_000_500.0, -10.0);
    assert_eq!(builder.origin().get(), Some(shape_origin));
    let asset = build.entities(Collection::StagedAssets)[0];
    let position = build.world.transform(asset).map(|t| t.position).expect("transform");
    let expected = remap(400_010.0, 7_000_020.0, -50.0) - shape_origin;
    assert!((position - expected).length() < 1e-6);
}
