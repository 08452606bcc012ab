use foundation::bounds::Aabb3;
use foundation::math::Vec3;

/// Indexed triangle list in single precision, ready for upload.
///
/// Positions are local to the owning entity's transform, which keeps them
/// small regardless of where the entity sits in the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_indices(&self, tri: usize) -> Option<[u32; 3]> {
        let i = tri * 3;
        let s = self.indices.get(i..i + 3)?;
        Some([s[0], s[1], s[2]])
    }

    pub fn vertex(&self, index: u32) -> Option<Vec3> {
        self.positions.get(index as usize).copied().map(Vec3::from_f32)
    }

    pub fn triangle(&self, tri: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = self.triangle_indices(tri)?;
        Some([self.vertex(a)?, self.vertex(b)?, self.vertex(c)?])
    }

    pub fn bounds(&self) -> Option<Aabb3> {
        Aabb3::from_points(self.positions.iter().copied().map(Vec3::from_f32))
    }

    /// Area-weighted smooth normals from the triangle list.
    ///
    /// Vertices not referenced by any triangle keep an up normal.
    pub fn recompute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in 0..self.triangle_count() {
            let (Some(idx), Some([a, b, c])) = (self.triangle_indices(tri), self.triangle(tri))
            else {
                continue;
            };
            let n = (b - a).cross(c - a);
            for i in idx {
                acc[i as usize] = acc[i as usize] + n;
            }
        }
        self.normals = acc
            .into_iter()
            .map(|n| n.normalized().unwrap_or(Vec3::UP).to_f32())
            .collect();
    }
}
