//! Payload to scene graph.
//!
//! A build runs in two stages. Shapes, wells and connections are placed
//! synchronously, in collection order and ascending id order, so the first
//! qualifying record fixes the floating origin. Terrain layers and staged
//! assets then load concurrently on the calling task; their results are
//! anchored and inserted in task order once every task has finished, so the
//! scene does not depend on which download completed first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use formats::payload::{Collection, Payload, Quarantined, StagedAsset, TerrainLayer, parse_payload};
use formats::terrain_bin::decode_terrain;
use foundation::math::Vec3;
use foundation::math::origin::{OriginContext, normalize_point};
use foundation::math::precision::fits_f32_millimetres;
use futures_util::future::join_all;
use layers::{
    AssetPlacement, Placed, ProceduralMaterialBuilder, SkipReason, TerrainMesh, build_connection,
    build_shape, build_well, mesh_terrain,
};
use runtime::metrics::RunMetrics;
use runtime::progress::{ProgressReporter, TaskOutcome, progress_channel};
use scene::World;
use scene::components::{
    ComponentBounds, ComponentProperties, Drawable3D, Material, ModelAsset, RenderHints, Transform,
};
use scene::entity::EntityId;
use serde_json::Value;
use streaming::cache::{ModelCache, instantiate};
use streaming::io::Fetcher;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::IngestError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Parsing,
    Downloading,
    Complete,
    /// The payload itself could not be fetched or parsed.
    Failed,
}

pub type ProgressCallback = Box<dyn FnMut(&str, f64) + Send>;

/// Top-level grouping under the scene root.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SceneGroups {
    pub shapes: EntityId,
    pub wells: EntityId,
    pub connections: EntityId,
    pub terrain: EntityId,
    pub assets: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub collection: Collection,
    pub id: String,
    pub reason: SkipReason,
}

/// An asynchronous task whose download or decode failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failed {
    pub collection: Collection,
    pub id: String,
    pub error: String,
}

#[derive(Debug)]
pub struct SceneBuild {
    pub world: World,
    pub root: EntityId,
    pub groups: SceneGroups,
    pub state: BuildState,
    pub metrics: RunMetrics,
    pub skipped: Vec<Skipped>,
    pub failed: Vec<Failed>,
    pub quarantined: Vec<Quarantined>,
}

impl SceneBuild {
    fn new() -> Self {
        let mut world = World::new();
        let root = world.spawn_child("scene", None);
        let groups = SceneGroups {
            shapes: world.spawn_child("shapes", Some(root)),
            wells: world.spawn_child("wells", Some(root)),
            connections: world.spawn_child("connections", Some(root)),
            terrain: world.spawn_child("terrain", Some(root)),
            assets: world.spawn_child("assets", Some(root)),
        };
        Self {
            world,
            root,
            groups,
            state: BuildState::Parsing,
            metrics: RunMetrics::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            quarantined: Vec::new(),
        }
    }

    /// Entities built for `collection`.
    pub fn entities(&self, collection: Collection) -> Vec<EntityId> {
        let group = match collection {
            Collection::Shapes => self.groups.shapes,
            Collection::Wells => self.groups.wells,
            Collection::Connections => self.groups.connections,
            Collection::TerrainLayers => self.groups.terrain,
            Collection::StagedAssets => self.groups.assets,
        };
        self.world.children(group)
    }

    fn skip(&mut self, collection: Collection, id: &str, reason: SkipReason) {
        debug!(%collection, id, %reason, "record skipped");
        self.metrics.record_skipped(collection.as_str(), reason.key());
        self.skipped.push(Skipped {
            collection,
            id: id.to_string(),
            reason,
        });
    }

    fn fail(&mut self, collection: Collection, id: &str, error: String) {
        self.metrics.record_failed(collection.as_str());
        self.failed.push(Failed {
            collection,
            id: id.to_string(),
            error,
        });
    }

    fn attach(
        &mut self,
        group: EntityId,
        name: &str,
        placed: Placed,
        props: ComponentProperties,
    ) -> EntityId {
        warn_if_far(name, placed.transform.position);
        let entity = self.world.spawn_child(name, Some(group));
        self.world.set_transform(entity, placed.transform);
        self.world.set_drawable(entity, placed.drawable);
        self.world.set_material(entity, placed.material);
        if let Some(bounds) = placed.bounds {
            self.world.set_bounds(entity, bounds);
        }
        self.world.set_properties(entity, props);
        entity
    }
}

pub struct SceneGraphBuilder<F: Fetcher> {
    fetcher: Arc<F>,
    cache: ModelCache<F>,
    materials: ProceduralMaterialBuilder,
    config: IngestConfig,
    origin: OriginContext,
    state: BuildState,
    on_progress: Option<ProgressCallback>,
}

impl<F: Fetcher> SceneGraphBuilder<F> {
    pub fn new(fetcher: Arc<F>, config: IngestConfig) -> Self {
        Self {
            cache: ModelCache::new(Arc::clone(&fetcher)),
            materials: config.material_builder(),
            fetcher,
            config,
            origin: OriginContext::new(),
            state: BuildState::Idle,
            on_progress: None,
        }
    }

    /// Receive `(message, percent)` updates. Percentages never decrease and
    /// every build ends on exactly 100.
    pub fn with_progress(mut self, callback: impl FnMut(&str, f64) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn origin(&self) -> &OriginContext {
        &self.origin
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn cache(&self) -> &ModelCache<F> {
        &self.cache
    }

    /// Full scene reset: the next build picks a fresh origin. Loaded models
    /// stay cached since they carry no origin-relative data.
    pub fn reset(&mut self) {
        self.origin.reset();
        self.state = BuildState::Idle;
    }

    /// Fetch and parse the payload at `url`, then build it.
    pub async fn build_from_url(&mut self, url: &str) -> Result<SceneBuild, IngestError> {
        self.state = BuildState::Parsing;
        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(source) => {
                self.state = BuildState::Failed;
                return Err(IngestError::Fetch {
                    url: url.to_string(),
                    source,
                });
            }
        };
        let payload = match parse_payload(&bytes) {
            Ok(payload) => payload,
            Err(source) => {
                self.state = BuildState::Failed;
                return Err(IngestError::Parse {
                    url: url.to_string(),
                    source,
                });
            }
        };
        info!(
            url,
            bytes = bytes.len(),
            quarantined = payload.quarantined.len(),
            "payload parsed"
        );
        Ok(self.build(&payload).await)
    }

    pub async fn build(&mut self, payload: &Payload) -> SceneBuild {
        let Self {
            fetcher,
            cache,
            materials,
            config,
            origin,
            state,
            on_progress,
        } = self;

        *state = BuildState::Parsing;
        let started = Instant::now();
        let mut out = SceneBuild::new();
        for q in &payload.quarantined {
            out.metrics
                .inc_counter(format!("{}.quarantined", q.collection.as_str()), 1);
        }
        out.quarantined = payload.quarantined.clone();

        place_sync(&mut out, payload, origin, config);
        out.metrics.record_duration("build.sync", started.elapsed());

        let specs: Vec<TaskSpec<'_>> = payload
            .terrain_layers
            .iter()
            .map(|(id, layer)| TaskSpec::Terrain { id, layer })
            .chain(
                payload
                    .staged_assets
                    .iter()
                    .map(|(id, asset)| TaskSpec::Asset { id, asset }),
            )
            .collect();

        let mut emit = |message: &str, percent: f64| {
            debug!(percent, message, "progress");
            if let Some(callback) = on_progress.as_mut() {
                callback(message, percent);
            }
        };

        let tasks = payload.async_task_count();
        debug_assert_eq!(tasks, specs.len());
        let (reporter, mut coordinator) = progress_channel(tasks);
        coordinator.finish_sync("Parsed payload", &mut emit);
        *state = BuildState::Downloading;
        info!(tasks, "loading terrain and assets");

        let env = TaskEnv {
            fetcher: &**fetcher,
            cache,
            materials,
            config,
            reporter,
        };
        let async_started = Instant::now();
        let (reports, _) = tokio::join!(
            async move {
                let reports = join_all(
                    specs
                        .iter()
                        .enumerate()
                        .map(|(index, spec)| run_task(&env, index, *spec)),
                )
                .await;
                // Closing the last sender ends the coordinator.
                drop(env);
                reports
            },
            coordinator.run(&mut emit),
        );
        out.metrics
            .record_duration("build.async", async_started.elapsed());

        for report in reports {
            insert_loaded(&mut out, origin, report);
        }

        *state = BuildState::Complete;
        out.state = BuildState::Complete;
        out.metrics.record_duration("build.total", started.elapsed());
        info!(
            entities = out.world.len(),
            skipped = out.skipped.len(),
            failed = out.failed.len(),
            quarantined = out.quarantined.len(),
            "scene built"
        );
        out
    }
}

fn warn_if_far(name: &str, anchor: Vec3) {
    if !fits_f32_millimetres(anchor) {
        warn!(
            entity = name,
            x = anchor.x,
            y = anchor.y,
            z = anchor.z,
            "entity is far from the floating origin; local geometry loses precision"
        );
    }
}

fn base_properties(collection: Collection, id: &str, name: &str) -> ComponentProperties {
    ComponentProperties::default()
        .with("collection", collection.as_str())
        .with("id", id)
        .with("name", name)
}

fn place_sync(
    out: &mut SceneBuild,
    payload: &Payload,
    origin: &OriginContext,
    config: &IngestConfig,
) {
    for (id, shape) in &payload.shapes {
        let name = shape.name.as_deref().unwrap_or(id);
        match build_shape(origin, shape) {
            Ok(placed) => {
                let props = base_properties(Collection::Shapes, id, name)
                    .with("shape_type", format!("{:?}", shape.shape_type).to_lowercase());
                out.attach(out.groups.shapes, name, placed, props);
                out.metrics.record_built(Collection::Shapes.as_str());
            }
            Err(reason) => out.skip(Collection::Shapes, id, reason),
        }
    }

    let tube = config.tube_options();
    for (id, well) in &payload.wells {
        let name = well.name.as_deref().unwrap_or(id);
        match build_well(origin, well, tube) {
            Ok(placed) => {
                let props = base_properties(Collection::Wells, id, name)
                    .with("radius", well.radius.to_string());
                out.attach(out.groups.wells, name, placed, props);
                out.metrics.record_built(Collection::Wells.as_str());
            }
            Err(reason) => out.skip(Collection::Wells, id, reason),
        }
    }

    for (id, connection) in &payload.connections {
        let name = connection.name.as_deref().unwrap_or(id);
        match build_connection(origin, connection, config.connection_width_px) {
            Ok(placed) => {
                let props = base_properties(Collection::Connections, id, name)
                    .with("color", connection.effective_color().to_hex());
                out.attach(out.groups.connections, name, placed, props);
                out.metrics.record_built(Collection::Connections.as_str());
            }
            Err(reason) => out.skip(Collection::Connections, id, reason),
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum TaskSpec<'p> {
    Terrain { id: &'p str, layer: &'p TerrainLayer },
    Asset { id: &'p str, asset: &'p StagedAsset },
}

impl<'p> TaskSpec<'p> {
    fn id(&self) -> &'p str {
        match self {
            TaskSpec::Terrain { id, .. } | TaskSpec::Asset { id, .. } => *id,
        }
    }

    fn collection(&self) -> Collection {
        match self {
            TaskSpec::Terrain { .. } => Collection::TerrainLayers,
            TaskSpec::Asset { .. } => Collection::StagedAssets,
        }
    }

    fn label(&self) -> String {
        match self {
            TaskSpec::Terrain { layer, .. } => format!("terrain layer '{}'", layer.display_name),
            TaskSpec::Asset { id, asset } => {
                format!("asset '{}'", asset.name.as_deref().unwrap_or(*id))
            }
        }
    }
}

enum Loaded {
    Terrain {
        mesh: TerrainMesh,
        material: Material,
    },
    Asset {
        placement: AssetPlacement,
        model: Arc<ModelAsset>,
    },
}

enum TaskFailure {
    Skipped(SkipReason),
    Failed(String),
}

struct TaskReport<'p> {
    spec: TaskSpec<'p>,
    outcome: Result<Loaded, TaskFailure>,
}

struct TaskEnv<'a, F: Fetcher> {
    fetcher: &'a F,
    cache: &'a ModelCache<F>,
    materials: &'a ProceduralMaterialBuilder,
    config: &'a IngestConfig,
    reporter: ProgressReporter,
}

/// One asynchronous unit. Every outcome, including skips, reports to the
/// coordinator exactly once.
async fn run_task<'p, F: Fetcher>(
    env: &TaskEnv<'_, F>,
    index: usize,
    spec: TaskSpec<'p>,
) -> TaskReport<'p> {
    let outcome = match spec {
        TaskSpec::Terrain { id, layer } => load_terrain(env, id, layer).await,
        TaskSpec::Asset { asset, .. } => load_asset(env, asset).await,
    };
    let progress = match &outcome {
        Ok(_) => TaskOutcome::Succeeded,
        Err(TaskFailure::Skipped(_)) => TaskOutcome::Skipped,
        Err(TaskFailure::Failed(error)) => {
            warn!(
                collection = %spec.collection(),
                id = spec.id(),
                error = %error,
                "load failed; continuing without it"
            );
            TaskOutcome::Failed
        }
    };
    env.reporter.complete(index, spec.label(), progress);
    TaskReport { spec, outcome }
}

async fn load_terrain<F: Fetcher>(
    env: &TaskEnv<'_, F>,
    id: &str,
    layer: &TerrainLayer,
) -> Result<Loaded, TaskFailure> {
    let url = layer
        .source_url
        .as_deref()
        .ok_or(TaskFailure::Skipped(SkipReason::MissingGeometry("source url")))?;
    if !layer.is_binary_format {
        return Err(TaskFailure::Skipped(SkipReason::UnsupportedFormat));
    }
    let bytes = env
        .fetcher
        .fetch(url)
        .await
        .map_err(|e| TaskFailure::Failed(e.to_string()))?;
    let grid = decode_terrain(&bytes).map_err(|e| TaskFailure::Failed(e.to_string()))?;
    let mesh = mesh_terrain(&grid, env.config.terrain_normals);
    if mesh.triangle_count() == 0 {
        return Err(TaskFailure::Skipped(SkipReason::Degenerate));
    }
    info!(
        layer = id,
        width = mesh.width,
        height = mesh.height,
        triangles = mesh.triangle_count(),
        "terrain meshed"
    );
    let material = env.materials.material_for(layer);
    Ok(Loaded::Terrain { mesh, material })
}

async fn load_asset<F: Fetcher>(
    env: &TaskEnv<'_, F>,
    asset: &StagedAsset,
) -> Result<Loaded, TaskFailure> {
    let placement = AssetPlacement::plan(asset).map_err(TaskFailure::Skipped)?;
    let model = env
        .cache
        .get_or_load(&placement.model_url)
        .await
        .map_err(|e| TaskFailure::Failed(e.to_string()))?;
    Ok(Loaded::Asset { placement, model })
}

fn insert_loaded(out: &mut SceneBuild, origin: &OriginContext, report: TaskReport<'_>) {
    let collection = report.spec.collection();
    let id = report.spec.id();
    let loaded = match report.outcome {
        Ok(loaded) => loaded,
        Err(TaskFailure::Skipped(reason)) => return out.skip(collection, id, reason),
        Err(TaskFailure::Failed(error)) => return out.fail(collection, id, error),
    };

    match (loaded, report.spec) {
        (Loaded::Terrain { mesh, material }, TaskSpec::Terrain { layer, .. }) => {
            let anchor = mesh.world_anchor(origin);
            let bounds = mesh
                .local_bounds()
                .map(|b| ComponentBounds::from_aabb(&b.translated(anchor)));
            let placed = Placed {
                transform: Transform::translate(anchor),
                drawable: Drawable3D::Surface(Arc::clone(&mesh.surface)),
                material,
                bounds,
            };
            let props = base_properties(collection, id, &layer.display_name)
                .with("source_url", layer.source_url.clone().unwrap_or_default())
                .with("triangles", mesh.triangle_count().to_string());
            let entity = out.attach(out.groups.terrain, &layer.display_name, placed, props);
            // Terrain spans the view; culling by its bounds pops whole tiles.
            out.world.set_render_hints(
                entity,
                RenderHints {
                    frustum_culled: false,
                    ..RenderHints::default()
                },
            );
        }
        (Loaded::Asset { placement, model }, TaskSpec::Asset { asset, .. }) => {
            if let Some(seed) = model.heuristic_origin {
                origin.seed_render(seed);
            }
            let position = normalize_point(origin, placement.position);
            let instance = instantiate(&model, position, placement.scale, placement.rotation);
            let name = asset.name.as_deref().unwrap_or(id);
            let mut props = base_properties(collection, id, name)
                .with("model_url", placement.model_url.as_str());
            for (key, value) in &asset.metadata {
                props.set(key.as_str(), metadata_string(value));
            }

            warn_if_far(name, position);
            let entity = out.world.spawn_child(name, Some(out.groups.assets));
            out.world.set_transform(entity, instance.transform);
            if let Some(bounds) = instance.world_bounds() {
                out.world.set_bounds(entity, ComponentBounds::from_aabb(&bounds));
            }
            *out.world.display_flags_mut(entity) = instance.display;
            out.world.set_drawable(entity, Drawable3D::Model(instance.model));
            out.world.set_properties(entity, props);
        }
        _ => {
            warn!(%collection, id, "task result does not match its request");
            return;
        }
    }
    out.metrics.record_built(collection.as_str());
}

fn metadata_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Built entities per collection.
pub fn count_by_collection(build: &SceneBuild) -> BTreeMap<Collection, usize> {
    [
        Collection::Shapes,
        Collection::Wells,
        Collection::Connections,
        Collection::TerrainLayers,
        Collection::StagedAssets,
    ]
    .into_iter()
    .map(|c| (c, build.entities(c).len()))
    .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BuildState, SceneGraphBuilder};
    use crate::config::IngestConfig;
    use crate::error::IngestError;
    use formats::payload::{Collection, Payload};
    use foundation::math::Vec3;
    use layers::SkipReason;
    use pretty_assertions::assert_eq;
    use streaming::io::MemoryFetcher;

    const SHAPES: &str = r#"{
        "shapes": {
            "a-artifact": {"type": "box", "position": [0.005, 0.005, 10], "dimensions": {"width": 1, "height": 1, "depth": 1}},
            "b-jacket": {"type": "box", "position": [5000, 5000, 10], "dimensions": {"width": 1, "height": 1, "depth": 1}}
        }
    }"#;

    #[tokio::test]
    async fn artifact_shapes_are_dropped_and_origin_follows_first_kept() {
        let payload = Payload::from_json(SHAPES).expect("payload");
        let mut builder = SceneGraphBuilder::new(Arc::new(MemoryFetcher::new()), IngestConfig::default());
        let build = builder.build(&payload).await;

        assert_eq!(build.state, BuildState::Complete);
        assert_eq!(build.entities(Collection::Shapes).len(), 1);
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.skipped[0].reason, SkipReason::Artifact);
        assert_eq!(build.metrics.counter("shapes.skipped.artifact"), 1);

        let jacket = build.entities(Collection::Shapes)[0];
        assert_eq!(build.world.name(jacket), Some("b-jacket"));
        assert_eq!(build.world.transform(jacket).map(|t| t.position), Some(Vec3::ZERO));
        assert!(builder.origin().is_set());
    }

    #[tokio::test]
    async fn reset_clears_origin() {
        let payload = Payload::from_json(SHAPES).expect("payload");
        let mut builder = SceneGraphBuilder::new(Arc::new(MemoryFetcher::new()), IngestConfig::default());
        builder.build(&payload).await;
        builder.reset();
        assert!(!builder.origin().is_set());
        assert_eq!(builder.state(), BuildState::Idle);
    }

    #[tokio::test]
    async fn empty_payload_reports_complete() {
        let percents = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&percents);
        let mut builder = SceneGraphBuilder::new(Arc::new(MemoryFetcher::new()), IngestConfig::default())
            .with_progress(move |_, p| sink.lock().expect("lock").push(p));
        let build = builder.build(&Payload::default()).await;
        assert_eq!(build.world.len(), 6);
        assert_eq!(*percents.lock().expect("lock"), vec![100.0]);
    }

    #[tokio::test]
    async fn payload_failures_are_fatal() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("bad.json", &b"[1, 2"[..]);
        let mut builder = SceneGraphBuilder::new(fetcher, IngestConfig::default());

        assert!(matches!(
            builder.build_from_url("missing.json").await,
            Err(IngestError::Fetch { .. })
        ));
        assert!(matches!(
            builder.build_from_url("bad.json").await,
            Err(IngestError::Parse { .. })
        ));
        assert_eq!(builder.state(), BuildState::Failed);
    }
}
