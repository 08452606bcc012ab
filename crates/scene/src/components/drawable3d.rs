use std::sync::Arc;

use foundation::math::Vec3;

use super::mesh::TriangleMesh;
use super::model::ModelAsset;
use crate::spatial::SurfaceMesh;

/// Parametric solids; the renderer tessellates them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Primitive {
    Box {
        width: f64,
        height: f64,
        depth: f64,
    },
    Cylinder {
        radius_top: f64,
        radius_bottom: f64,
        height: f64,
    },
    Sphere {
        radius: f64,
    },
}

impl Primitive {
    /// A primitive with any zero (or negative) extent renders nothing.
    pub fn is_degenerate(&self) -> bool {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        match *self {
            Primitive::Box {
                width,
                height,
                depth,
            } => !(positive(width) && positive(height) && positive(depth)),
            Primitive::Cylinder {
                radius_top,
                radius_bottom,
                height,
            } => !(positive(height) && (positive(radius_top) || positive(radius_bottom))),
            Primitive::Sphere { radius } => !positive(radius),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawableKind {
    Primitive,
    Line,
    Polygon,
    Tube,
    Polyline,
    Surface,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Drawable3D {
    Primitive(Primitive),
    /// World-width line through points local to the entity transform.
    Line { points: Vec<Vec3> },
    /// Filled, triangulated outline.
    Polygon {
        outline: Vec<Vec3>,
        fill: TriangleMesh,
    },
    Tube(Arc<TriangleMesh>),
    /// Line drawn with a constant on-screen width.
    Polyline { points: Vec<Vec3>, width_px: f32 },
    Surface(Arc<SurfaceMesh>),
    Model(Arc<ModelAsset>),
}

impl Drawable3D {
    pub fn kind(&self) -> DrawableKind {
        match self {
            Drawable3D::Primitive(_) => DrawableKind::Primitive,
            Drawable3D::Line { .. } => DrawableKind::Line,
            Drawable3D::Polygon { .. } => DrawableKind::Polygon,
            Drawable3D::Tube(_) => DrawableKind::Tube,
            Drawable3D::Polyline { .. } => DrawableKind::Polyline,
            Drawable3D::Surface(_) => DrawableKind::Surface,
            Drawable3D::Model(_) => DrawableKind::Model,
        }
    }
}
