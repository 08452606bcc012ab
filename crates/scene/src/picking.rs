use foundation::math::Vec3;
use foundation::math::precision::stable_total_cmp_f64;

use crate::World;
use crate::components::{Drawable3D, DrawableKind};
use crate::entity::EntityId;
use crate::spatial::{Bvh, Item as BvhItem, ray_aabb_entry};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub entity: EntityId,
    pub kind: DrawableKind,
    pub distance: f64,
    pub point: Vec3,
    /// Triangle index for surface hits.
    pub triangle: Option<u32>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    pub max_distance: f64,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_distance: 1.0e30,
        }
    }
}

/// Deterministic ray picking over visible drawables with bounds.
///
/// Ordering contract:
/// - The closest hit along the (normalized) ray wins.
/// - On equal distance, the lower `EntityId::index()` wins.
///
/// Surfaces (terrain) are refined against their triangles through the
/// per-surface BVH, so a ray grazing the terrain's bounding box but missing
/// the mesh does not pick it. Other drawables pick on their bounds.
pub fn pick_ray(world: &World, ray: Ray, opts: PickOptions) -> Option<PickHit> {
    let dir = ray.dir.normalized()?;

    let mut items: Vec<BvhItem<EntityId>> = Vec::new();
    for (entity, _transform, _drawable) in world.drawables() {
        let Some(b) = world.bounds(entity) else {
            continue;
        };
        items.push(BvhItem {
            key: entity,
            bounds: b.to_aabb(),
        });
    }
    if items.is_empty() {
        return None;
    }

    let bvh = Bvh::build(items);
    let origin = ray.origin.to_array();
    let dir_a = dir.to_array();

    let mut best: Option<PickHit> = None;
    for entity in bvh.query_ray(origin, dir_a, 0.0, opts.max_distance) {
        let (Some(drawable), Some(transform), Some(bounds)) = (
            world.drawable(entity),
            world.transform(entity),
            world.bounds(entity),
        ) else {
            continue;
        };

        let hit = match drawable {
            Drawable3D::Surface(surface) => {
                let local_origin = ray.origin - transform.position;
                surface
                    .raycast(local_origin, dir, opts.max_distance)
                    .map(|h| (h.distance, Some(h.triangle)))
            }
            _ => ray_aabb_entry(origin, dir_a, &bounds.to_aabb(), 0.0, opts.max_distance)
                .map(|t| (t, None)),
        };
        let Some((t, triangle)) = hit else {
            continue;
        };

        let closer = best
            .map(|b| {
                stable_total_cmp_f64(t, b.distance)
                    .then_with(|| entity.index().cmp(&b.entity.index()))
                    .is_lt()
            })
            .unwrap_or(true);
        if closer {
            best = Some(PickHit {
                entity,
                kind: drawable.kind(),
                distance: t,
                point: ray.origin + dir * t,
                triangle,
            });
        }
    }

    best
}
