//! JSON model documents for placeable equipment.
//!
//! ```json
//! {
//!   "name": "pump",
//!   "meshes": [
//!     { "name": "body", "positions": [[0,0,0], ...], "indices": [0,1,2, ...],
//!       "normals": [[0,1,0], ...], "color": "#c0c0c0" }
//!   ],
//!   "extras": { "center": [512000.0, 6712000.0, -80.0] }
//! }
//! ```
//!
//! Positions are model space with render axes (y up). `extras.center` is an
//! optional georeference hint in domain coordinates (east, north, elevation).

use foundation::bounds::Aabb3;
use foundation::color::Color;
use foundation::math::origin::remap;
use scene::components::{ModelAsset, ModelPart, TriangleMesh};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelDecodeError {
    #[error("model document is not valid JSON: {0}")]
    Json(String),
    #[error("model document has no meshes")]
    Empty,
    #[error("mesh {mesh}: {reason}")]
    InvalidMesh { mesh: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default)]
    meshes: Vec<RawMesh>,
    #[serde(default)]
    extras: RawExtras,
}

#[derive(Debug, Deserialize)]
struct RawMesh {
    #[serde(default)]
    name: Option<String>,
    positions: Vec<[f32; 3]>,
    #[serde(default)]
    indices: Option<Vec<u32>>,
    #[serde(default)]
    normals: Option<Vec<[f32; 3]>>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtras {
    #[serde(default)]
    center: Option<[f64; 3]>,
}

/// Decode a model document into its canonical in-memory form.
pub fn decode_model(source_url: &str, bytes: &[u8]) -> Result<ModelAsset, ModelDecodeError> {
    let raw: RawModel =
        serde_json::from_slice(bytes).map_err(|err| ModelDecodeError::Json(err.to_string()))?;
    if raw.meshes.is_empty() {
        return Err(ModelDecodeError::Empty);
    }

    let mut parts = Vec::with_capacity(raw.meshes.len());
    for (idx, mesh) in raw.meshes.into_iter().enumerate() {
        parts.push(decode_part(idx, mesh)?);
    }

    let bounds = parts
        .iter()
        .filter_map(|p| p.mesh.bounds())
        .reduce(|a, b| a.union(&b));

    let heuristic_origin = match raw.extras.center {
        Some([east, north, elevation]) => Some(remap(east, north, elevation)),
        None => bounds.as_ref().map(Aabb3::center),
    }
    .filter(|v| v.is_finite());

    debug!(
        url = source_url,
        parts = parts.len(),
        hinted = raw.extras.center.is_some(),
        "model decoded"
    );

    Ok(ModelAsset {
        source_url: source_url.to_string(),
        parts,
        bounds,
        heuristic_origin,
    })
}

fn decode_part(idx: usize, raw: RawMesh) -> Result<ModelPart, ModelDecodeError> {
    let invalid = |reason: String| ModelDecodeError::InvalidMesh { mesh: idx, reason };

    if raw.positions.is_empty() {
        return Err(invalid("no positions".to_string()));
    }
    if raw.positions.iter().flatten().any(|c| !c.is_finite()) {
        return Err(invalid("non-finite position".to_string()));
    }
    let vertex_count = raw.positions.len() as u32;

    let indices = match raw.indices {
        Some(indices) => indices,
        None => (0..vertex_count).collect(),
    };
    if indices.len() % 3 != 0 {
        return Err(invalid(format!(
            "index count {} is not a multiple of 3",
            indices.len()
        )));
    }
    if let Some(bad) = indices.iter().find(|i| **i >= vertex_count) {
        return Err(invalid(format!(
            "index {bad} out of range for {vertex_count} vertices"
        )));
    }

    let color = match raw.color.as_deref() {
        Some(hex) => {
            Color::from_hex_str(hex).ok_or_else(|| invalid(format!("unrecognized color {hex:?}")))?
        }
        None => Color::WHITE,
    };

    let mut mesh = TriangleMesh {
        positions: raw.positions,
        normals: raw.normals.unwrap_or_default(),
        uvs: Vec::new(),
        indices,
    };
    if mesh.normals.len() != mesh.positions.len() {
        mesh.recompute_normals();
    }

    Ok(ModelPart {
        name: raw.name,
        mesh,
        color,
    })
}

#[cfg(test)]
mod tests {
    use super::{ModelDecodeError, decode_model};
    use foundation::math::Vec3;
    use foundation::math::origin::ELEVATION_BIAS;
    use pretty_assertions::assert_eq;

    const CUBE_CORNERS: &str = r#"[[-1,0,-1],[1,0,-1],[1,2,1],[-1,2,1]]"#;

    #[test]
    fn center_hint_is_remapped_to_render_axes() {
        let json = format!(
            r#"{{"meshes":[{{"positions":{CUBE_CORNERS},"indices":[0,1,2,0,2,3]}}],
                "extras":{{"center":[512000.0, 6712000.0, -80.0]}}}}"#
        );
        let model = decode_model("m.json", json.as_bytes()).expect("decode");
        assert_eq!(model.parts.len(), 1);
        assert_eq!(model.triangle_count(), 2);
        assert_eq!(
            model.heuristic_origin,
            Some(Vec3::new(512_000.0, -80.0 + ELEVATION_BIAS, -6_712_000.0))
        );
        assert_eq!(model.parts[0].mesh.normals.len(), 4);
    }

    #[test]
    fn falls_back_to_bounding_box_center() {
        let json = r##"{"meshes":[{"positions":[[-1,0,-1],[1,0,-1],[1,2,1]],"color":"#336699"}]}"##;
        let model = decode_model("m.json", json.as_bytes()).expect("decode");
        assert_eq!(model.heuristic_origin, Some(Vec3::new(0.0, 1.0, 0.0)));
        // Without indices the positions are read as a plain triangle list.
        assert_eq!(model.parts[0].mesh.indices, vec![0, 1, 2]);
        assert_eq!(model.parts[0].color.to_hex(), "#336699");
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(matches!(
            decode_model("m.json", b"{"),
            Err(ModelDecodeError::Json(_))
        ));
        assert_eq!(
            decode_model("m.json", br#"{"meshes":[]}"#),
            Err(ModelDecodeError::Empty)
        );
        assert!(matches!(
            decode_model(
                "m.json",
                br#"{"meshes":[{"positions":[[0,0,0]],"indices":[0,0,1]}]}"#
            ),
            Err(ModelDecodeError::InvalidMesh { mesh: 0, .. })
        ));
    }
}
