use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use foundation::math::precision::stable_total_cmp_f64;

use super::bvh::{Bvh, Item};
use crate::components::TriangleMesh;

/// Closest intersection of a ray with a surface, in mesh-local space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceHit {
    pub triangle: u32,
    pub distance: f64,
    pub point: Vec3,
}

/// Triangle mesh paired with a BVH over its triangles.
///
/// Terrain meshes routinely exceed 10^5 triangles; pointer queries go through
/// the hierarchy instead of testing every triangle.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    mesh: TriangleMesh,
    index: Bvh<u32>,
}

impl PartialEq for SurfaceMesh {
    fn eq(&self, other: &Self) -> bool {
        self.mesh == other.mesh
    }
}

impl SurfaceMesh {
    pub fn build(mesh: TriangleMesh) -> Self {
        let items = (0..mesh.triangle_count())
            .filter_map(|tri| {
                let [a, b, c] = mesh.triangle(tri)?;
                let bounds = Aabb3::from_points([a, b, c])?;
                Some(Item {
                    key: tri as u32,
                    bounds,
                })
            })
            .collect();
        let index = Bvh::build(items);
        Self { mesh, index }
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn index(&self) -> &Bvh<u32> {
        &self.index
    }

    pub fn bounds(&self) -> Option<Aabb3> {
        self.index.bounds()
    }

    /// Nearest triangle hit along `dir` (need not be normalized) within
    /// `max_distance` units of `dir`'s length. Both faces count.
    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_distance: f64) -> Option<SurfaceHit> {
        let dir = dir.normalized()?;
        let candidates = self
            .index
            .query_ray(origin.to_array(), dir.to_array(), 0.0, max_distance);

        let mut best: Option<SurfaceHit> = None;
        for tri in candidates {
            let Some([a, b, c]) = self.mesh.triangle(tri as usize) else {
                continue;
            };
            let Some(t) = ray_triangle(origin, dir, a, b, c) else {
                continue;
            };
            if t > max_distance {
                continue;
            }
            // Candidates arrive in ascending triangle order; strict less keeps
            // the lowest index on ties.
            let closer = best
                .map(|h| stable_total_cmp_f64(t, h.distance).is_lt())
                .unwrap_or(true);
            if closer {
                best = Some(SurfaceHit {
                    triangle: tri,
                    distance: t,
                    point: origin + dir * t,
                });
            }
        }
        best
    }

    /// Surface elevation under local `(x, z)`, if any triangle covers it.
    pub fn height_at(&self, x: f64, z: f64) -> Option<f64> {
        let bounds = self.bounds()?;
        let top = bounds.max[1] + 1.0;
        let span = top - bounds.min[1] + 1.0;
        self.raycast(Vec3::new(x, top, z), Vec3::new(0.0, -1.0, 0.0), span)
            .map(|hit| hit.point.y)
    }
}

/// Möller–Trumbore, double sided. Returns distance along a unit `dir`.
fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f64> {
    const EPS: f64 = 1e-12;
    // Shared edges must not leak rays between adjacent triangles.
    const EDGE_TOL: f64 = 1e-9;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv;
    if !(-EDGE_TOL..=1.0 + EDGE_TOL).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < -EDGE_TOL || u + v > 1.0 + EDGE_TOL {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t >= 0.0).then_some(t)
}
