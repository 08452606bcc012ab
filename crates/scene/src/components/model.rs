use foundation::bounds::Aabb3;
use foundation::color::Color;
use foundation::math::Vec3;

use super::mesh::TriangleMesh;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelPart {
    pub name: Option<String>,
    pub mesh: TriangleMesh,
    pub color: Color,
}

/// Canonical, immutable in-memory form of a downloaded model.
///
/// Shared behind an `Arc` by every placement; per-placement state (transform,
/// display flags) lives on the placing entity, never here.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub source_url: String,
    pub parts: Vec<ModelPart>,
    /// Bounds of all parts in model space.
    pub bounds: Option<Aabb3>,
    /// Render-space (remapped, origin not subtracted) location the model was
    /// authored around, if it is georeferenced.
    pub heuristic_origin: Option<Vec3>,
}

impl ModelAsset {
    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.triangle_count()).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.parts.iter().map(|p| p.mesh.vertex_count()).sum()
    }
}
