//! Heightfield meshing.
//!
//! Grid sample `(i, j)` sits at east `minX + i * stepX`, north
//! `minY + j * stepY`. Vertices are stored relative to the grid's bounding-box
//! center so they stay small; the entity carrying the mesh is placed at the
//! normalized center.

use std::sync::Arc;

use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use foundation::math::origin::{OriginContext, normalize_point};
use formats::terrain_bin::TerrainGrid;
use scene::components::TriangleMesh;
use scene::spatial::{SurfaceHit, SurfaceMesh};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalMode {
    /// Every vertex normal points straight up.
    #[default]
    Up,
    /// Smooth normals from central differences over valid neighbours.
    Computed,
}

/// Triangulated terrain ready for placement.
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    pub width: u32,
    pub height: u32,
    /// Grid bounding-box center, domain coordinates.
    pub domain_center: Vec3,
    pub surface: Arc<SurfaceMesh>,
}

impl TerrainMesh {
    pub fn mesh(&self) -> &TriangleMesh {
        self.surface.mesh()
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh().triangle_count()
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh().vertex_count()
    }

    /// Render-space anchor. May establish the origin, so callers control the
    /// order in which meshes are anchored.
    pub fn world_anchor(&self, ctx: &OriginContext) -> Vec3 {
        normalize_point(ctx, self.domain_center)
    }

    /// Local-space bounds of the emitted triangles.
    pub fn local_bounds(&self) -> Option<Aabb3> {
        self.surface.bounds()
    }

    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_distance: f64) -> Option<SurfaceHit> {
        self.surface.raycast(origin, dir, max_distance)
    }

    pub fn height_at(&self, x: f64, z: f64) -> Option<f64> {
        self.surface.height_at(x, z)
    }
}

/// Build the masked surface mesh for a decoded grid.
///
/// For each cell with corners a=(i,j), b=(i,j+1), c=(i+1,j+1), d=(i+1,j),
/// triangle (b,a,d) is emitted only when b, d and a carry data, and (c,b,d)
/// only when b, d and c do. Masked samples keep their vertex slot (clamped to
/// the minimum elevation) so the vertex count always equals width x height.
pub fn mesh_terrain(grid: &TerrainGrid, normals: NormalMode) -> TerrainMesh {
    let header = &grid.header;
    let (w, h) = (grid.width(), grid.height());
    let (step_x, step_y) = header.step();
    let center = header.center();
    let min_elev = header.min_elevation() as f64;

    let count = header.sample_count();
    let mut positions = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);
    for j in 0..h {
        for i in 0..w {
            let east = header.min[0] as f64 + i as f64 * step_x;
            let north = header.min[1] as f64 + j as f64 * step_y;
            let elev = if grid.is_valid(i, j) {
                grid.sample(i, j) as f64
            } else {
                min_elev
            };
            positions.push([
                (east - center.x) as f32,
                (elev - center.z) as f32,
                -(north - center.y) as f32,
            ]);
            uvs.push([fraction(i, w), fraction(j, h)]);
        }
    }

    let idx = |i: u32, j: u32| j * w + i;
    let mut indices = Vec::new();
    for j in 0..h.saturating_sub(1) {
        for i in 0..w.saturating_sub(1) {
            let (a, b, c, d) = ((i, j), (i, j + 1), (i + 1, j + 1), (i + 1, j));
            let valid = |(x, y): (u32, u32)| grid.is_valid(x, y);
            if !(valid(b) && valid(d)) {
                continue;
            }
            if valid(a) {
                indices.extend_from_slice(&[idx(b.0, b.1), idx(a.0, a.1), idx(d.0, d.1)]);
            }
            if valid(c) {
                indices.extend_from_slice(&[idx(c.0, c.1), idx(b.0, b.1), idx(d.0, d.1)]);
            }
        }
    }

    let normals = match normals {
        NormalMode::Up => vec![[0.0, 1.0, 0.0]; count],
        NormalMode::Computed => gradient_normals(grid, step_x, step_y),
    };

    let mesh = TriangleMesh {
        positions,
        normals,
        uvs,
        indices,
    };
    debug!(
        width = w,
        height = h,
        valid = grid.valid_count(),
        triangles = mesh.triangle_count(),
        "terrain meshed"
    );

    TerrainMesh {
        width: w,
        height: h,
        domain_center: center,
        surface: Arc::new(SurfaceMesh::build(mesh)),
    }
}

fn fraction(i: u32, n: u32) -> f32 {
    if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 }
}

fn gradient_normals(grid: &TerrainGrid, step_x: f64, step_y: f64) -> Vec<[f32; 3]> {
    let (w, h) = (grid.width(), grid.height());
    let height_or = |i: u32, j: u32, fallback: f64| {
        if grid.is_valid(i, j) {
            grid.sample(i, j) as f64
        } else {
            fallback
        }
    };

    let mut out = Vec::with_capacity(grid.header.sample_count());
    for j in 0..h {
        for i in 0..w {
            let here = height_or(i, j, grid.header.min_elevation() as f64);
            let (il, ir) = (i.saturating_sub(1), (i + 1).min(w - 1));
            let (jl, jr) = (j.saturating_sub(1), (j + 1).min(h - 1));
            let slope = |lo: f64, hi: f64, span: u32, step: f64| {
                if span == 0 || step == 0.0 {
                    0.0
                } else {
                    (hi - lo) / (span as f64 * step)
                }
            };
            let de = slope(height_or(il, j, here), height_or(ir, j, here), ir - il, step_x);
            let dn = slope(height_or(i, jl, here), height_or(i, jr, here), jr - jl, step_y);
            // Render z is -north, so the north slope enters with a flipped sign.
            let n = Vec3::new(-de, 1.0, dn).normalized().unwrap_or(Vec3::UP);
            out.push(n.to_f32());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{NormalMode, mesh_terrain};
    use foundation::math::Vec3;
    use foundation::math::origin::{ELEVATION_BIAS, OriginContext};
    use formats::terrain_bin::{TerrainGrid, TerrainHeader};
    use pretty_assertions::assert_eq;

    fn grid(width: u32, height: u32, samples: Vec<f32>) -> TerrainGrid {
        TerrainGrid {
            header: TerrainHeader {
                width,
                height,
                min: [500_000.0, 6_700_000.0, -100.0],
                max: [
                    500_000.0 + 10.0 * (width - 1) as f32,
                    6_700_000.0 + 10.0 * (height - 1) as f32,
                    -20.0,
                ],
            },
            samples,
        }
    }

    #[test]
    fn full_grid_has_two_triangles_per_cell() {
        let t = mesh_terrain(&grid(3, 3, vec![-50.0; 9]), NormalMode::Up);
        assert_eq!(t.vertex_count(), 9);
        assert_eq!(t.triangle_count(), 8);
        assert_eq!(t.mesh().normals[4], [0.0, 1.0, 0.0]);
        assert_eq!(t.mesh().uvs[5], [1.0, 0.5]);
    }

    #[test]
    fn masked_center_never_appears_as_a_or_c_corner() {
        let mut samples = vec![-50.0; 9];
        samples[4] = -100.0; // at the minimum: no data
        let t = mesh_terrain(&grid(3, 3, samples), NormalMode::Up);

        assert!(t.triangle_count() < 8);
        assert_eq!(t.vertex_count(), 9);
        let center = 4;
        for tri in t.mesh().indices.chunks_exact(3) {
            // (b, a, d) puts `a` second; (c, b, d) puts `c` first.
            assert!(!tri.contains(&center), "masked vertex used: {tri:?}");
        }
    }

    #[test]
    fn vertices_are_local_to_center_and_face_up() {
        let t = mesh_terrain(&grid(3, 3, vec![-50.0; 9]), NormalMode::Up);
        // Column 0, row 0 is the south-west corner: west and toward +z.
        assert_eq!(t.mesh().positions[0], [-10.0, -50.0 + 60.0, 10.0]);
        assert_eq!(t.domain_center, Vec3::new(500_010.0, 6_700_010.0, -60.0));

        let [a, b, c] = t.mesh().triangle(0).expect("triangle");
        let n = (b - a).cross(c - a);
        assert!(n.y > 0.0, "counter-clockwise seen from above");
    }

    #[test]
    fn anchor_is_normalized_center() {
        let t = mesh_terrain(&grid(2, 2, vec![-50.0; 4]), NormalMode::Up);
        let ctx = OriginContext::new();
        assert_eq!(t.world_anchor(&ctx), Vec3::ZERO);
        assert_eq!(
            ctx.get(),
            Some(Vec3::new(500_005.0, -60.0 + ELEVATION_BIAS, -6_700_005.0))
        );
    }

    #[test]
    fn spatial_index_answers_height_queries() {
        let mut samples = vec![-50.0; 16];
        samples[5] = -30.0;
        let t = mesh_terrain(&grid(4, 4, samples), NormalMode::Up);
        let local = t.height_at(0.0, 0.0).expect("covered");
        // Grid is 30 m wide centred on 0; (0, 0) lies inside the raised cell.
        assert!(local > -50.0 - (-60.0) - 1e-6);
        assert!(t.height_at(100.0, 0.0).is_none());
    }

    #[test]
    fn computed_normals_tilt_away_from_slope() {
        // Rising toward the east.
        let samples = vec![-90.0, -60.0, -30.0, -90.0, -60.0, -30.0, -90.0, -60.0, -30.0];
        let t = mesh_terrain(&grid(3, 3, samples), NormalMode::Computed);
        let n = t.mesh().normals[4];
        assert!(n[0] < 0.0);
        assert!(n[1] > 0.0);
        assert!(n[2].abs() < 1e-6);
    }
}
