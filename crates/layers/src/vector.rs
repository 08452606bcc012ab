//! Shapes and connections.
//!
//! Both are built synchronously, before any asynchronous work starts, and
//! each record is independent: a bad record yields a `SkipReason`, never an
//! error for the whole collection.

use earcutr::earcut;
use formats::payload::{Connection, Shape, ShapeType};
use foundation::math::Vec3;
use foundation::math::origin::{OriginContext, normalize_point};
use scene::components::{
    ComponentBounds, Drawable3D, Material, Primitive, Rotation, Transform, TriangleMesh,
};

use crate::layer::{Placed, SkipReason, is_origin_artifact, translated_bounds};

/// Domain offset (east, north, up) to a render-space offset. No bias, no
/// origin: offsets are relative to an already normalized anchor.
fn offset_to_render(p: Vec3) -> Vec3 {
    Vec3::new(p.x, p.z, -p.y)
}

pub fn build_shape(ctx: &OriginContext, shape: &Shape) -> Result<Placed, SkipReason> {
    let position = shape.position.ok_or(SkipReason::MissingGeometry("position"))?;
    if is_origin_artifact(position) {
        return Err(SkipReason::Artifact);
    }

    let drawable = match shape.shape_type {
        ShapeType::Box => primitive(Primitive::Box {
            width: shape.dimensions.width,
            height: shape.dimensions.height,
            depth: shape.dimensions.depth,
        })?,
        ShapeType::Cylinder => {
            let radius = shape.dimensions.radius_or_half_width();
            primitive(Primitive::Cylinder {
                radius_top: radius,
                radius_bottom: radius,
                height: shape.dimensions.height,
            })?
        }
        ShapeType::Sphere => primitive(Primitive::Sphere {
            radius: shape.dimensions.radius_or_half_width(),
        })?,
        ShapeType::Line => {
            let points: Vec<Vec3> = shape.points.iter().copied().map(offset_to_render).collect();
            if points.len() < 2 {
                return Err(SkipReason::Degenerate);
            }
            Drawable3D::Line { points }
        }
        ShapeType::Polygon => polygon(&shape.points)?,
    };

    let anchor = normalize_point(ctx, position);
    let r = shape.rotation;
    // Domain rotation is about (east, north, up); render axes are
    // (east, up, -north).
    let rotation = Rotation::from_degrees(r.x, r.z, -r.y);
    let transform = Transform::translate(anchor).with_rotation(rotation);

    let bounds = match &drawable {
        Drawable3D::Primitive(p) => Some(primitive_bounds(anchor, p)),
        Drawable3D::Line { points } => translated_bounds(anchor, points.iter().copied()),
        Drawable3D::Polygon { outline, .. } => translated_bounds(anchor, outline.iter().copied()),
        _ => None,
    };

    let color = match shape.opacity {
        Some(a) => shape.color.with_alpha(a.clamp(0.0, 1.0)),
        None => shape.color,
    };
    let mut material = Material::solid(color);
    material.double_sided = matches!(drawable, Drawable3D::Polygon { .. });

    Ok(Placed {
        transform,
        drawable,
        material,
        bounds,
    })
}

fn primitive(p: Primitive) -> Result<Drawable3D, SkipReason> {
    if p.is_degenerate() {
        return Err(SkipReason::Degenerate);
    }
    Ok(Drawable3D::Primitive(p))
}

/// Rotation-independent bounds: a cube around the primitive's bounding sphere.
fn primitive_bounds(anchor: Vec3, p: &Primitive) -> ComponentBounds {
    let r = match *p {
        Primitive::Box {
            width,
            height,
            depth,
        } => 0.5 * (width * width + height * height + depth * depth).sqrt(),
        Primitive::Cylinder {
            radius_top,
            radius_bottom,
            height,
        } => {
            let radius = radius_top.max(radius_bottom);
            (radius * radius + 0.25 * height * height).sqrt()
        }
        Primitive::Sphere { radius } => radius,
    };
    let e = Vec3::new(r, r, r);
    ComponentBounds::new(anchor - e, anchor + e)
}

fn polygon(points: &[Vec3]) -> Result<Drawable3D, SkipReason> {
    let mut ring: Vec<Vec3> = points.to_vec();
    drop_closing_duplicate(&mut ring);
    if ring.len() < 3 {
        return Err(SkipReason::Degenerate);
    }

    // Triangulate in the horizontal plane, (east, north).
    let coords: Vec<f64> = ring.iter().flat_map(|p| [p.x, p.y]).collect();
    let tris = earcut(&coords, &[], 2).map_err(|_| SkipReason::Degenerate)?;
    if tris.is_empty() {
        return Err(SkipReason::Degenerate);
    }

    let outline: Vec<Vec3> = ring.iter().copied().map(offset_to_render).collect();
    let mut fill = TriangleMesh {
        positions: outline.iter().map(|p| p.to_f32()).collect(),
        normals: Vec::new(),
        uvs: Vec::new(),
        indices: tris.iter().map(|i| *i as u32).collect(),
    };
    // Wind every triangle counter-clockwise seen from above.
    for tri in fill.indices.chunks_exact_mut(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| outline[i as usize]);
        if (b - a).cross(c - a).y < 0.0 {
            tri.swap(1, 2);
        }
    }
    fill.recompute_normals();

    Ok(Drawable3D::Polygon { outline, fill })
}

fn drop_closing_duplicate(points: &mut Vec<Vec3>) {
    if points.len() >= 2 && points[0].distance(points[points.len() - 1]) < 1e-9 {
        points.pop();
    }
}

/// Connections are drawn with a constant on-screen width, anchored at their
/// first sample.
pub fn build_connection(
    ctx: &OriginContext,
    connection: &Connection,
    default_width_px: f32,
) -> Result<Placed, SkipReason> {
    let first = connection
        .points
        .first()
        .copied()
        .ok_or(SkipReason::MissingGeometry("points"))?;
    if connection.points.len() < 2 {
        return Err(SkipReason::Degenerate);
    }

    let anchor = normalize_point(ctx, first);
    let points: Vec<Vec3> = connection
        .points
        .iter()
        .map(|p| normalize_point(ctx, *p) - anchor)
        .collect();
    let bounds = translated_bounds(anchor, points.iter().copied());
    let width_px = connection
        .width_px
        .filter(|w| w.is_finite() && *w > 0.0)
        .unwrap_or(default_width_px);

    Ok(Placed {
        transform: Transform::translate(anchor),
        drawable: Drawable3D::Polyline { points, width_px },
        material: Material::solid(connection.effective_color()),
        bounds,
    })
}
