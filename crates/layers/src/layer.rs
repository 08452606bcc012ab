use std::fmt;

use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use scene::components::{ComponentBounds, Drawable3D, Material, Transform};

/// Horizontal magnitude below which a record position is a data artifact.
pub const ARTIFACT_EPSILON: f64 = 0.01;

/// Records sitting at the domain origin are export defaults, not geometry.
pub fn is_origin_artifact(domain: Vec3) -> bool {
    domain.x.abs() < ARTIFACT_EPSILON && domain.y.abs() < ARTIFACT_EPSILON
}

/// Why a record produced no entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// A field the geometry needs is absent (url, position, points).
    MissingGeometry(&'static str),
    /// Positioned at the domain origin.
    Artifact,
    /// Geometry exists but would render nothing.
    Degenerate,
    /// Layer source in a format this pipeline does not mesh.
    UnsupportedFormat,
}

impl SkipReason {
    /// Stable metric key.
    pub fn key(&self) -> &'static str {
        match self {
            SkipReason::MissingGeometry(_) => "missing_geometry",
            SkipReason::Artifact => "artifact",
            SkipReason::Degenerate => "degenerate",
            SkipReason::UnsupportedFormat => "unsupported_format",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingGeometry(field) => write!(f, "missing {field}"),
            SkipReason::Artifact => f.write_str("artifact at domain origin"),
            SkipReason::Degenerate => f.write_str("degenerate geometry"),
            SkipReason::UnsupportedFormat => f.write_str("unsupported format"),
        }
    }
}

/// A renderable ready to be attached to a scene entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub transform: Transform,
    pub drawable: Drawable3D,
    pub material: Material,
    /// World-space bounds, when known.
    pub bounds: Option<ComponentBounds>,
}

/// World bounds of local points under a pure translation.
pub(crate) fn translated_bounds(
    anchor: Vec3,
    local: impl IntoIterator<Item = Vec3>,
) -> Option<ComponentBounds> {
    Aabb3::from_points(local)
        .map(|b| b.translated(anchor))
        .map(|b| ComponentBounds::from_aabb(&b))
}
