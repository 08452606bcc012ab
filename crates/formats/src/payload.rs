//! Ingestion payload: the JSON document describing one facility scene.
//!
//! Payloads arrive in several historical dialects. Field-name variants are
//! reconciled here (serde aliases plus a small adapter per record kind) into
//! one canonical shape. Records that cannot be read as any known variant are
//! quarantined with a reason instead of entering the pipeline.
//!
//! All coordinates stay in domain space (`x` east, `y` north, `z` elevation or
//! depth). Collections are keyed by identifier and iterate in ascending key
//! order, which is the order the scene builder consumes them in.

use std::collections::BTreeMap;
use std::fmt;

use foundation::color::Color;
use foundation::math::Vec3;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_WELL_RADIUS: f64 = 0.5;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not a valid JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Shapes,
    Wells,
    Connections,
    TerrainLayers,
    StagedAssets,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Shapes => "shapes",
            Collection::Wells => "wells",
            Collection::Connections => "connections",
            Collection::TerrainLayers => "terrainLayers",
            Collection::StagedAssets => "stagedAssets",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record rejected by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Quarantined {
    pub collection: Collection,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Box,
    Cylinder,
    Line,
    Polygon,
    Sphere,
}

impl ShapeType {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "box" | "cube" => Some(ShapeType::Box),
            "cylinder" => Some(ShapeType::Cylinder),
            "line" | "linestring" => Some(ShapeType::Line),
            "polygon" => Some(ShapeType::Polygon),
            "sphere" => Some(ShapeType::Sphere),
            _ => None,
        }
    }
}

/// Primitive extents in meters. Unused axes stay zero.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub radius: Option<f64>,
}

impl Dimensions {
    /// Explicit radius, else half the width.
    pub fn radius_or_half_width(&self) -> f64 {
        self.radius.unwrap_or(self.width * 0.5)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub name: Option<String>,
    pub shape_type: ShapeType,
    pub position: Option<Vec3>,
    pub dimensions: Dimensions,
    /// Degrees about the east, north and up axes.
    pub rotation: Vec3,
    pub color: Color,
    pub opacity: Option<f32>,
    /// Line and polygon vertices, relative to `position`.
    pub points: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Well {
    pub name: Option<String>,
    /// Trajectory with `z` as depth, positive down.
    pub path: Vec<Vec3>,
    pub radius: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub name: Option<String>,
    pub points: Vec<Vec3>,
    pub color: Color,
    pub type_color: Option<Color>,
    pub width_px: Option<f32>,
}

impl Connection {
    /// Type color wins unless absent or the neutral placeholder.
    pub fn effective_color(&self) -> Color {
        match self.type_color {
            Some(c) if !c.same_rgb(Color::PLACEHOLDER) => c,
            _ => self.color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainLayer {
    pub display_name: String,
    pub source_url: Option<String>,
    pub is_binary_format: bool,
    pub normal_map_url: Option<String>,
    pub seabed_style_key: Option<String>,
    pub texture_url: Option<String>,
    pub texture_repeat: Option<f32>,
    pub opacity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedAsset {
    pub name: Option<String>,
    pub model_url: Option<String>,
    pub position: Option<Vec3>,
    pub heading_degrees: f64,
    pub tilt_degrees: Option<f64>,
    pub roll_degrees: Option<f64>,
    pub scale: f64,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub shapes: BTreeMap<String, Shape>,
    pub wells: BTreeMap<String, Well>,
    pub connections: BTreeMap<String, Connection>,
    pub terrain_layers: BTreeMap<String, TerrainLayer>,
    pub staged_assets: BTreeMap<String, StagedAsset>,
    pub quarantined: Vec<Quarantined>,
}

impl Payload {
    pub fn from_json(json: &str) -> Result<Self, PayloadError> {
        let raw: RawPayload = serde_json::from_str(json)?;
        Ok(raw.adapt())
    }

    /// Number of asynchronous units (terrain layers plus staged assets).
    pub fn async_task_count(&self) -> usize {
        self.terrain_layers.len() + self.staged_assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
            && self.wells.is_empty()
            && self.connections.is_empty()
            && self.terrain_layers.is_empty()
            && self.staged_assets.is_empty()
    }
}

pub fn parse_payload(bytes: &[u8]) -> Result<Payload, PayloadError> {
    let raw: RawPayload = serde_json::from_slice(bytes)?;
    Ok(raw.adapt())
}

type RawCollection = Option<BTreeMap<String, Value>>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default)]
    shapes: RawCollection,
    #[serde(default)]
    wells: RawCollection,
    #[serde(default, alias = "pipes")]
    connections: RawCollection,
    #[serde(default, alias = "layers", alias = "terrain_layers", alias = "terrain")]
    terrain_layers: RawCollection,
    #[serde(default, alias = "assets", alias = "staged_assets")]
    staged_assets: RawCollection,
}

impl RawPayload {
    fn adapt(self) -> Payload {
        let mut quarantined = Vec::new();
        let payload = Payload {
            shapes: adapt_collection(Collection::Shapes, self.shapes, &mut quarantined, adapt_shape),
            wells: adapt_collection(Collection::Wells, self.wells, &mut quarantined, adapt_well),
            connections: adapt_collection(
                Collection::Connections,
                self.connections,
                &mut quarantined,
                adapt_connection,
            ),
            terrain_layers: adapt_collection(
                Collection::TerrainLayers,
                self.terrain_layers,
                &mut quarantined,
                adapt_terrain_layer,
            ),
            staged_assets: adapt_collection(
                Collection::StagedAssets,
                self.staged_assets,
                &mut quarantined,
                adapt_staged_asset,
            ),
            quarantined: Vec::new(),
        };
        debug!(
            shapes = payload.shapes.len(),
            wells = payload.wells.len(),
            connections = payload.connections.len(),
            terrain_layers = payload.terrain_layers.len(),
            staged_assets = payload.staged_assets.len(),
            quarantined = quarantined.len(),
            "payload adapted"
        );
        Payload {
            quarantined,
            ..payload
        }
    }
}

fn adapt_collection<R, T>(
    collection: Collection,
    raw: RawCollection,
    quarantined: &mut Vec<Quarantined>,
    adapt: impl Fn(&str, R) -> Result<T, String>,
) -> BTreeMap<String, T>
where
    R: DeserializeOwned,
{
    let mut out = BTreeMap::new();
    for (id, value) in raw.unwrap_or_default() {
        let adapted = serde_json::from_value::<R>(value)
            .map_err(|err| err.to_string())
            .and_then(|record| adapt(&id, record));
        match adapted {
            Ok(record) => {
                out.insert(id, record);
            }
            Err(reason) => {
                warn!(%collection, %id, %reason, "record quarantined");
                quarantined.push(Quarantined {
                    collection,
                    id,
                    reason,
                });
            }
        }
    }
    out
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Array(Vec<f64>),
    Object {
        #[serde(alias = "east", alias = "easting")]
        x: f64,
        #[serde(alias = "north", alias = "northing")]
        y: f64,
        #[serde(default, alias = "elevation", alias = "depth")]
        z: f64,
    },
}

impl RawPoint {
    fn to_vec3(&self) -> Result<Vec3, String> {
        let v = match self {
            RawPoint::Array(c) => match c.as_slice() {
                [x, y] => Vec3::new(*x, *y, 0.0),
                [x, y, z] => Vec3::new(*x, *y, *z),
                other => return Err(format!("point needs 2 or 3 components, got {}", other.len())),
            },
            RawPoint::Object { x, y, z } => Vec3::new(*x, *y, *z),
        };
        if v.is_finite() {
            Ok(v)
        } else {
            Err("point has non-finite components".to_string())
        }
    }
}

fn points(raw: Option<Vec<RawPoint>>) -> Result<Vec<Vec3>, String> {
    raw.unwrap_or_default().iter().map(RawPoint::to_vec3).collect()
}

fn point(raw: Option<RawPoint>) -> Result<Option<Vec3>, String> {
    raw.as_ref().map(RawPoint::to_vec3).transpose()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColor {
    Packed(u32),
    Text(String),
    Components(Vec<f32>),
}

impl RawColor {
    fn to_color(&self) -> Result<Color, String> {
        match self {
            RawColor::Packed(rgb) => Ok(Color::from_rgb_u32(*rgb)),
            RawColor::Text(s) => {
                Color::from_hex_str(s).ok_or_else(|| format!("unrecognized color {s:?}"))
            }
            RawColor::Components(c) => {
                // Components above 1 mean the 0..=255 convention.
                let scale = if c.iter().any(|v| *v > 1.0) { 255.0 } else { 1.0 };
                match c.as_slice() {
                    [r, g, b] => Ok(Color::rgb(r / scale, g / scale, b / scale)),
                    [r, g, b, a] => Ok(Color::rgb(r / scale, g / scale, b / scale).with_alpha(*a)),
                    other => Err(format!("color needs 3 or 4 components, got {}", other.len())),
                }
            }
        }
    }
}

fn color(raw: Option<&RawColor>, default: Color) -> Result<Color, String> {
    raw.map(RawColor::to_color).transpose().map(|c| c.unwrap_or(default))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDimensions {
    Array(Vec<f64>),
    Object {
        #[serde(default, alias = "x", alias = "length", alias = "diameter")]
        width: f64,
        #[serde(default, alias = "y")]
        height: f64,
        #[serde(default, alias = "z")]
        depth: f64,
        #[serde(default)]
        radius: Option<f64>,
    },
}

impl RawDimensions {
    fn to_dimensions(&self) -> Dimensions {
        match self {
            RawDimensions::Array(v) => Dimensions {
                width: v.first().copied().unwrap_or(0.0),
                height: v.get(1).copied().unwrap_or(0.0),
                depth: v.get(2).copied().unwrap_or(0.0),
                radius: None,
            },
            RawDimensions::Object {
                width,
                height,
                depth,
                radius,
            } => Dimensions {
                width: *width,
                height: *height,
                depth: *depth,
                radius: *radius,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShape {
    #[serde(alias = "type", alias = "shape_type", alias = "kind")]
    shape_type: String,
    #[serde(default, alias = "label")]
    name: Option<String>,
    #[serde(default, alias = "center", alias = "location")]
    position: Option<RawPoint>,
    #[serde(default, alias = "size")]
    dimensions: Option<RawDimensions>,
    #[serde(default)]
    radius: Option<f64>,
    #[serde(default)]
    rotation: Option<RawPoint>,
    #[serde(default, alias = "colour")]
    color: Option<RawColor>,
    #[serde(default)]
    opacity: Option<f32>,
    #[serde(default, alias = "vertices", alias = "coordinates")]
    points: Option<Vec<RawPoint>>,
}

fn adapt_shape(_id: &str, raw: RawShape) -> Result<Shape, String> {
    let shape_type = ShapeType::parse(&raw.shape_type)
        .ok_or_else(|| format!("unknown shape type {:?}", raw.shape_type))?;
    let mut dimensions = raw
        .dimensions
        .as_ref()
        .map(RawDimensions::to_dimensions)
        .unwrap_or_default();
    if raw.radius.is_some() {
        dimensions.radius = raw.radius;
    }
    Ok(Shape {
        name: raw.name,
        shape_type,
        position: point(raw.position)?,
        dimensions,
        rotation: point(raw.rotation)?.unwrap_or(Vec3::ZERO),
        color: color(raw.color.as_ref(), Color::WHITE)?,
        opacity: raw.opacity,
        points: points(raw.points)?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWell {
    #[serde(default, alias = "label", alias = "wellName")]
    name: Option<String>,
    #[serde(default, alias = "points", alias = "trajectory", alias = "survey")]
    path: Option<Vec<RawPoint>>,
    #[serde(default)]
    radius: Option<f64>,
    #[serde(default, alias = "colour")]
    color: Option<RawColor>,
}

fn adapt_well(_id: &str, raw: RawWell) -> Result<Well, String> {
    let radius = raw.radius.unwrap_or(DEFAULT_WELL_RADIUS);
    if !(radius.is_finite() && radius > 0.0) {
        return Err(format!("invalid well radius {radius}"));
    }
    Ok(Well {
        name: raw.name,
        path: points(raw.path)?,
        radius,
        color: color(raw.color.as_ref(), Color::WHITE)?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnection {
    #[serde(default, alias = "label")]
    name: Option<String>,
    #[serde(
        default,
        alias = "sampled_points",
        alias = "points",
        alias = "path",
        alias = "route"
    )]
    sampled_points: Option<Vec<RawPoint>>,
    #[serde(default, alias = "colour")]
    color: Option<RawColor>,
    #[serde(default, alias = "type_color", alias = "connectionTypeColor")]
    type_color: Option<RawColor>,
    #[serde(default, alias = "width", alias = "lineWidth")]
    width_px: Option<f32>,
}

fn adapt_connection(_id: &str, raw: RawConnection) -> Result<Connection, String> {
    Ok(Connection {
        name: raw.name,
        points: points(raw.sampled_points)?,
        color: color(raw.color.as_ref(), Color::PLACEHOLDER)?,
        type_color: raw.type_color.as_ref().map(RawColor::to_color).transpose()?,
        width_px: raw.width_px,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTerrainLayer {
    #[serde(default, alias = "name", alias = "display_name", alias = "label")]
    display_name: Option<String>,
    #[serde(default, alias = "url", alias = "source_url", alias = "dataUrl")]
    source_url: Option<String>,
    #[serde(default, alias = "is_binary_format", alias = "binary")]
    is_binary_format: Option<bool>,
    #[serde(default, alias = "normal_map_url", alias = "normalMap")]
    normal_map_url: Option<String>,
    #[serde(default, alias = "seabed_style_key", alias = "seabedStyle", alias = "style")]
    seabed_style_key: Option<String>,
    #[serde(default, alias = "texture_url", alias = "texture")]
    texture_url: Option<String>,
    #[serde(default, alias = "texture_repeat", alias = "repeat")]
    texture_repeat: Option<f32>,
    #[serde(default)]
    opacity: Option<f32>,
}

fn adapt_terrain_layer(id: &str, raw: RawTerrainLayer) -> Result<TerrainLayer, String> {
    let source_url = raw.source_url.filter(|u| !u.trim().is_empty());
    let is_binary_format = raw.is_binary_format.unwrap_or_else(|| {
        source_url
            .as_deref()
            .is_some_and(has_binary_terrain_extension)
    });
    Ok(TerrainLayer {
        display_name: raw.display_name.unwrap_or_else(|| id.to_string()),
        source_url,
        is_binary_format,
        normal_map_url: raw.normal_map_url.filter(|u| !u.trim().is_empty()),
        seabed_style_key: raw.seabed_style_key,
        texture_url: raw.texture_url.filter(|u| !u.trim().is_empty()),
        texture_repeat: raw.texture_repeat,
        opacity: raw.opacity,
    })
}

fn has_binary_terrain_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    matches!(ext.as_deref(), Some("bin" | "raw" | "dat" | "hgt"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScale {
    Uniform(f64),
    PerAxis(Vec<f64>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStagedAsset {
    #[serde(default, alias = "label")]
    name: Option<String>,
    #[serde(
        default,
        alias = "model_url",
        alias = "modelUri",
        alias = "url",
        alias = "model"
    )]
    model_url: Option<String>,
    #[serde(default, alias = "location", alias = "center")]
    position: Option<RawPoint>,
    #[serde(default, alias = "heading", alias = "heading_degrees", alias = "yaw")]
    heading_degrees: Option<f64>,
    #[serde(default, alias = "tilt", alias = "pitch")]
    tilt_degrees: Option<f64>,
    #[serde(default, alias = "roll")]
    roll_degrees: Option<f64>,
    #[serde(default)]
    scale: Option<RawScale>,
    #[serde(default, alias = "properties", alias = "attributes")]
    metadata: Option<BTreeMap<String, Value>>,
}

fn adapt_staged_asset(_id: &str, raw: RawStagedAsset) -> Result<StagedAsset, String> {
    let scale = match raw.scale {
        None => 1.0,
        Some(RawScale::Uniform(s)) => s,
        // Non-uniform scale collapses to the first axis; models are authored
        // at true size and only ever uniformly rescaled.
        Some(RawScale::PerAxis(v)) => v.first().copied().unwrap_or(1.0),
    };
    if !(scale.is_finite() && scale > 0.0) {
        return Err(format!("invalid asset scale {scale}"));
    }
    Ok(StagedAsset {
        name: raw.name,
        model_url: raw.model_url.filter(|u| !u.trim().is_empty()),
        position: point(raw.position)?,
        heading_degrees: raw.heading_degrees.unwrap_or(0.0),
        tilt_degrees: raw.tilt_degrees,
        roll_degrees: raw.roll_degrees,
        scale,
        metadata: raw.metadata.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::{Collection, ShapeType, parse_payload};
    use foundation::color::Color;
    use foundation::math::Vec3;
    use pretty_assertions::assert_eq;

    #[test]
    fn reconciles_field_name_variants() {
        let json = r##"{
            "shapes": {
                "s2": { "type": "box", "center": {"x": 5000, "y": 5000, "z": 10},
                        "size": [2, 3, 4], "color": "#ff0000" },
                "s1": { "shapeType": "Sphere", "position": [10, 20, 30], "radius": 1.5,
                        "color": 65280 }
            },
            "layers": {
                "seabed": { "url": "terrain/seabed.bin", "name": "Seabed" }
            },
            "assets": {
                "a": { "modelUri": "models/pump.json", "location": [1, 2, 3], "heading": 90 }
            }
        }"##;
        let payload = parse_payload(json.as_bytes()).expect("parse");

        let ids: Vec<&str> = payload.shapes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["s1", "s2"]);

        let s1 = &payload.shapes["s1"];
        assert_eq!(s1.shape_type, ShapeType::Sphere);
        assert_eq!(s1.position, Some(Vec3::new(10.0, 20.0, 30.0)));
        assert_eq!(s1.dimensions.radius, Some(1.5));
        assert_eq!(s1.color, Color::from_rgb_u32(0x00ff00));

        let s2 = &payload.shapes["s2"];
        assert_eq!(s2.shape_type, ShapeType::Box);
        assert_eq!(s2.dimensions.depth, 4.0);
        assert_eq!(s2.color.to_hex(), "#ff0000");

        let layer = &payload.terrain_layers["seabed"];
        assert_eq!(layer.display_name, "Seabed");
        assert_eq!(layer.source_url.as_deref(), Some("terrain/seabed.bin"));
        assert!(layer.is_binary_format);

        let asset = &payload.staged_assets["a"];
        assert_eq!(asset.model_url.as_deref(), Some("models/pump.json"));
        assert_eq!(asset.heading_degrees, 90.0);
        assert_eq!(asset.scale, 1.0);
        assert_eq!(payload.async_task_count(), 2);
        assert!(payload.quarantined.is_empty());
    }

    #[test]
    fn unreadable_records_are_quarantined() {
        let json = r#"{
            "shapes": {
                "bad-type": { "type": "torus", "position": [1, 2, 3] },
                "no-type": { "position": [1, 2, 3] },
                "ok": { "type": "cylinder", "position": [1, 2, 3] }
            },
            "wells": {
                "bad-point": { "path": [[1, 2, 3, 4]] }
            }
        }"#;
        let payload = parse_payload(json.as_bytes()).expect("parse");
        assert_eq!(payload.shapes.len(), 1);
        assert!(payload.shapes.contains_key("ok"));

        let quarantined: Vec<(Collection, &str)> = payload
            .quarantined
            .iter()
            .map(|q| (q.collection, q.id.as_str()))
            .collect();
        assert_eq!(
            quarantined,
            vec![
                (Collection::Shapes, "bad-type"),
                (Collection::Shapes, "no-type"),
                (Collection::Wells, "bad-point"),
            ]
        );
        assert!(payload.quarantined[0].reason.contains("torus"));
    }

    #[test]
    fn missing_geometry_is_kept_for_the_builder_to_skip() {
        let json = r#"{
            "terrainLayers": { "empty": { "sourceUrl": "  " } },
            "stagedAssets": { "nourl": { "position": [1, 2, 3] } },
            "wells": { "nopath": { "radius": 2 } }
        }"#;
        let payload = parse_payload(json.as_bytes()).expect("parse");
        assert_eq!(payload.terrain_layers["empty"].source_url, None);
        assert_eq!(payload.terrain_layers["empty"].display_name, "empty");
        assert_eq!(payload.staged_assets["nourl"].model_url, None);
        assert!(payload.wells["nopath"].path.is_empty());
        assert!(payload.quarantined.is_empty());
    }

    #[test]
    fn connection_type_color_overrides_unless_placeholder() {
        let json = r##"{
            "connections": {
                "a": { "points": [[0,0,0],[1,1,1]], "color": "#112233", "typeColor": "#808080" },
                "b": { "sampledPoints": [[0,0,0],[1,1,1]], "color": "#112233", "typeColor": [0, 0, 255] }
            }
        }"##;
        let payload = parse_payload(json.as_bytes()).expect("parse");
        assert_eq!(payload.connections["a"].effective_color().to_hex(), "#112233");
        assert_eq!(payload.connections["b"].effective_color().to_hex(), "#0000ff");
    }

    #[test]
    fn top_level_garbage_is_fatal() {
        assert!(parse_payload(b"not json").is_err());
        assert!(parse_payload(b"[1, 2, 3]").is_err());
        let empty = parse_payload(b"{}").expect("empty object is a valid payload");
        assert!(empty.is_empty());
    }
}
