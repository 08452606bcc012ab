//! Well trajectories as tube meshes.

use std::sync::Arc;

use formats::payload::Well;
use foundation::math::Vec3;
use foundation::math::origin::{OriginContext, normalize};
use scene::components::{Drawable3D, Material, Transform, TriangleMesh};

use crate::layer::{Placed, SkipReason, translated_bounds};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TubeOptions {
    pub radial_segments: u32,
    pub samples_per_span: u32,
}

impl Default for TubeOptions {
    fn default() -> Self {
        Self {
            radial_segments: 12,
            samples_per_span: 8,
        }
    }
}

/// Build a well. Depth is positive down in the payload and is negated to
/// elevation before normalization.
pub fn build_well(ctx: &OriginContext, well: &Well, opts: TubeOptions) -> Result<Placed, SkipReason> {
    if well.path.is_empty() {
        return Err(SkipReason::MissingGeometry("path"));
    }
    let path = dedup_consecutive(well.path.clone());
    if path.len() < 2 {
        return Err(SkipReason::Degenerate);
    }
    let render: Vec<Vec3> = path
        .iter()
        .map(|p| normalize(ctx, p.x, p.y, -p.z))
        .collect();
    let anchor = render[0];
    let local: Vec<Vec3> = render.iter().map(|p| *p - anchor).collect();

    let curve = catmull_rom_centripetal(&local, opts.samples_per_span.max(1));
    let mesh = tube_mesh(&curve, well.radius, opts.radial_segments.max(3));
    let r = well.radius;
    let bounds = translated_bounds(
        anchor,
        curve
            .iter()
            .flat_map(|p| [*p - Vec3::new(r, r, r), *p + Vec3::new(r, r, r)]),
    );

    Ok(Placed {
        transform: Transform::translate(anchor),
        drawable: Drawable3D::Tube(Arc::new(mesh)),
        material: Material::solid(well.color),
        bounds,
    })
}

fn dedup_consecutive(mut points: Vec<Vec3>) -> Vec<Vec3> {
    points.dedup_by(|b, a| a.distance(*b) < 1e-6);
    points
}

/// Centripetal Catmull-Rom through `points`, including both end points.
///
/// End tangents come from mirrored phantom points. Centripetal
/// parameterization keeps sharp doglegs from overshooting or looping.
pub fn catmull_rom_centripetal(points: &[Vec3], samples_per_span: u32) -> Vec<Vec3> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let n = points.len();
    let first = points[0] * 2.0 - points[1];
    let last = points[n - 1] * 2.0 - points[n - 2];
    let at = |i: isize| -> Vec3 {
        if i < 0 {
            first
        } else if i as usize >= n {
            last
        } else {
            points[i as usize]
        }
    };

    let mut out = Vec::with_capacity((n - 1) * samples_per_span as usize + 1);
    for span in 0..n - 1 {
        let i = span as isize;
        let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
        let knot = |a: Vec3, b: Vec3| a.distance(b).sqrt().max(1e-9);
        let t0 = 0.0;
        let t1 = t0 + knot(p0, p1);
        let t2 = t1 + knot(p1, p2);
        let t3 = t2 + knot(p2, p3);
        for s in 0..samples_per_span {
            let t = t1 + (t2 - t1) * s as f64 / samples_per_span as f64;
            out.push(barry_goldman(p0, p1, p2, p3, [t0, t1, t2, t3], t));
        }
    }
    out.push(points[n - 1]);
    out
}

fn barry_goldman(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, k: [f64; 4], t: f64) -> Vec3 {
    let lerp = |a: Vec3, b: Vec3, ta: f64, tb: f64| a.lerp(b, (t - ta) / (tb - ta));
    let a1 = lerp(p0, p1, k[0], k[1]);
    let a2 = lerp(p1, p2, k[1], k[2]);
    let a3 = lerp(p2, p3, k[2], k[3]);
    let b1 = lerp(a1, a2, k[0], k[2]);
    let b2 = lerp(a2, a3, k[1], k[3]);
    lerp(b1, b2, k[1], k[2])
}

/// Sweep a circle along `curve` using parallel-transport frames, which do
/// not twist on straight vertical runs the way Frenet frames do.
pub fn tube_mesh(curve: &[Vec3], radius: f64, radial_segments: u32) -> TriangleMesh {
    let mut mesh = TriangleMesh::default();
    if curve.len() < 2 {
        return mesh;
    }

    let tangents: Vec<Vec3> = (0..curve.len())
        .map(|i| {
            let (a, b) = if i + 1 < curve.len() {
                (curve[i], curve[i + 1])
            } else {
                (curve[i - 1], curve[i])
            };
            (b - a).normalized().unwrap_or(Vec3::new(0.0, -1.0, 0.0))
        })
        .collect();

    let mut normal = initial_normal(tangents[0]);
    let ring = radial_segments as usize + 1;
    for (i, (center, tangent)) in curve.iter().zip(&tangents).enumerate() {
        if i > 0 {
            normal = transport(normal, tangents[i - 1], *tangent);
        }
        let binormal = tangent.cross(normal);
        for s in 0..ring {
            let theta = std::f64::consts::TAU * s as f64 / radial_segments as f64;
            let dir = normal * theta.cos() + binormal * theta.sin();
            mesh.positions.push((*center + dir * radius).to_f32());
            mesh.normals.push(dir.to_f32());
            mesh.uvs.push([
                s as f32 / radial_segments as f32,
                i as f32 / (curve.len() - 1) as f32,
            ]);
        }
    }

    let ring = ring as u32;
    for i in 0..curve.len() as u32 - 1 {
        for s in 0..radial_segments {
            let a = i * ring + s;
            let b = a + ring;
            mesh.indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }
    mesh
}

fn initial_normal(tangent: Vec3) -> Vec3 {
    // Any axis not parallel to the tangent will do; prefer east.
    let axis = if tangent.x.abs() < 0.9 {
        Vec3::new(1.0, 0.0, 0.0)
    } else {
        Vec3::new(0.0, 0.0, 1.0)
    };
    let n = axis - tangent * axis.dot(tangent);
    n.normalized().unwrap_or(Vec3::new(1.0, 0.0, 0.0))
}

/// Rotate `normal` by the rotation taking `from` onto `to`.
fn transport(normal: Vec3, from: Vec3, to: Vec3) -> Vec3 {
    let axis = from.cross(to);
    let sin = axis.length();
    let cos = from.dot(to).clamp(-1.0, 1.0);
    let Some(k) = axis.normalized() else {
        return normal;
    };
    if sin < 1e-12 {
        return normal;
    }
    // Rodrigues.
    let rotated = normal * cos + k.cross(normal) * sin + k * (k.dot(normal) * (1.0 - cos));
    let projected = rotated - to * rotated.dot(to);
    projected.normalized().unwrap_or(rotated)
}

#[cfg(test)]
mod tests {
    use super::{TubeOptions, build_well, catmull_rom_centripetal, tube_mesh};
    use crate::layer::SkipReason;
    use formats::payload::Well;
    use foundation::color::Color;
    use foundation::math::Vec3;
    use foundation::math::origin::OriginContext;
    use scene::components::Drawable3D;

    fn well(path: Vec<Vec3>) -> Well {
        Well {
            name: None,
            path,
            radius: 0.5,
            color: Color::WHITE,
        }
    }

    #[test]
    fn curve_passes_through_control_points() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, -10.0, 0.0),
            Vec3::new(5.0, -20.0, 0.0),
        ];
        let curve = catmull_rom_centripetal(&pts, 4);
        assert_eq!(curve.len(), 9);
        assert!(curve[0].distance(pts[0]) < 1e-9);
        assert!(curve[4].distance(pts[1]) < 1e-9);
        assert!(curve[8].distance(pts[2]) < 1e-9);
    }

    #[test]
    fn tube_vertices_sit_at_radius() {
        let curve = vec![Vec3::ZERO, Vec3::new(0.0, -10.0, 0.0)];
        let mesh = tube_mesh(&curve, 2.0, 8);
        assert_eq!(mesh.vertex_count(), 2 * 9);
        assert_eq!(mesh.triangle_count(), 2 * 8);
        for p in &mesh.positions {
            let radial = (p[0] * p[0] + p[2] * p[2]).sqrt();
            assert!((radial - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn depth_goes_down() {
        let ctx = OriginContext::new();
        let placed = build_well(
            &ctx,
            &well(vec![
                Vec3::new(500_000.0, 6_700_000.0, 0.0),
                Vec3::new(500_000.0, 6_700_000.0, 1_000.0),
            ]),
            TubeOptions::default(),
        )
        .expect("well");
        assert_eq!(placed.transform.position, Vec3::ZERO);
        let bounds = placed.bounds.expect("bounds");
        assert!((bounds.min.y - -1_000.5).abs() < 1e-6);
        assert!(matches!(placed.drawable, Drawable3D::Tube(_)));
    }

    #[test]
    fn short_paths_are_skipped() {
        let ctx = OriginContext::new();
        assert_eq!(
            build_well(&ctx, &well(Vec::new()), TubeOptions::default()),
            Err(SkipReason::MissingGeometry("path"))
        );
        let single = well(vec![Vec3::new(10.0, 10.0, 0.0), Vec3::new(10.0, 10.0, 0.0)]);
        assert_eq!(
            build_well(&ctx, &single, TubeOptions::default()),
            Err(SkipReason::Degenerate)
        );
    }
}
