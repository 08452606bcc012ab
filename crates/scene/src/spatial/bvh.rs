use foundation::bounds::Aabb3;
use foundation::math::precision::stable_total_cmp_f64;

/// A deterministic bounding volume hierarchy (BVH) over `Aabb3` items.
///
/// Keys are whatever the caller indexes: entities for scene picking, triangle
/// indices for surface queries.
///
/// Ordering contract:
/// - `query_aabb` and `query_ray` return keys in ascending order.
#[derive(Debug, Clone)]
pub struct Bvh<K> {
    nodes: Vec<Node<K>>,
}

#[derive(Debug, Clone)]
enum Node<K> {
    Leaf {
        bounds: Aabb3,
        items: Vec<Item<K>>,
    },
    Internal {
        bounds: Aabb3,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Item<K> {
    pub key: K,
    pub bounds: Aabb3,
}

impl<K: Copy + Ord> Bvh<K> {
    pub fn build(items: Vec<Item<K>>) -> Self {
        let mut nodes = Vec::new();
        let mut items = items;
        if !items.is_empty() {
            let _root = build_node(&mut nodes, &mut items);
        }
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bounds(&self) -> Option<Aabb3> {
        self.nodes.first().map(|n| match n {
            Node::Leaf { bounds, .. } | Node::Internal { bounds, .. } => *bounds,
        })
    }

    /// Keys whose bounds intersect `query`, ascending.
    pub fn query_aabb(&self, query: &Aabb3) -> Vec<K> {
        self.collect(|b| b.intersects(query))
    }

    /// Keys whose bounds intersect the ray segment `[t_min, t_max]`, ascending.
    ///
    /// `origin` and `dir` are in the same coordinate system as the stored bounds.
    pub fn query_ray(&self, origin: [f64; 3], dir: [f64; 3], t_min: f64, t_max: f64) -> Vec<K> {
        self.collect(|b| ray_aabb_entry(origin, dir, b, t_min, t_max).is_some())
    }

    fn collect(&self, mut hit: impl FnMut(&Aabb3) -> bool) -> Vec<K> {
        if self.nodes.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<K> = Vec::new();
        let mut stack: Vec<usize> = vec![0];

        while let Some(idx) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { bounds, items } => {
                    if !hit(bounds) {
                        continue;
                    }
                    for item in items {
                        if hit(&item.bounds) {
                            hits.push(item.key);
                        }
                    }
                }
                Node::Internal {
                    bounds,
                    left,
                    right,
                } => {
                    if !hit(bounds) {
                        continue;
                    }
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }

        hits.sort();
        hits.dedup();
        hits
    }
}

const LEAF_MAX: usize = 8;

fn build_node<K: Copy + Ord>(nodes: &mut Vec<Node<K>>, items: &mut [Item<K>]) -> usize {
    let bounds = bounds_for_items(items);
    if items.len() <= LEAF_MAX {
        let idx = nodes.len();
        nodes.push(Node::Leaf {
            bounds,
            items: items.to_vec(),
        });
        return idx;
    }

    let axis = split_axis(&bounds);

    items.sort_by(|a, b| {
        let ca = centroid_axis(&a.bounds, axis);
        let cb = centroid_axis(&b.bounds, axis);
        stable_total_cmp_f64(ca, cb).then_with(|| a.key.cmp(&b.key))
    });

    let mid = items.len() / 2;
    let (left_items, right_items) = items.split_at_mut(mid);

    let idx = nodes.len();
    // Placeholder; patched once the children exist.
    nodes.push(Node::Leaf {
        bounds,
        items: Vec::new(),
    });

    let left = build_node(nodes, left_items);
    let right = build_node(nodes, right_items);

    nodes[idx] = Node::Internal {
        bounds,
        left,
        right,
    };
    idx
}

fn centroid_axis(aabb: &Aabb3, axis: usize) -> f64 {
    (aabb.min[axis] + aabb.max[axis]) * 0.5
}

fn split_axis(bounds: &Aabb3) -> usize {
    let ex = bounds.max[0] - bounds.min[0];
    let ey = bounds.max[1] - bounds.min[1];
    let ez = bounds.max[2] - bounds.min[2];

    // Deterministic tie-break: prefer X, then Y, then Z.
    if ex >= ey && ex >= ez {
        0
    } else if ey >= ez {
        1
    } else {
        2
    }
}

fn bounds_for_items<K>(items: &[Item<K>]) -> Aabb3 {
    let mut b = items[0].bounds;
    for item in &items[1..] {
        b = b.union(&item.bounds);
    }
    b
}

/// Slab test. Returns the entry distance clamped to `t_min`.
pub fn ray_aabb_entry(
    origin: [f64; 3],
    dir: [f64; 3],
    aabb: &Aabb3,
    mut t_min: f64,
    mut t_max: f64,
) -> Option<f64> {
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let min = aabb.min[axis];
        let max = aabb.max[axis];

        if d.abs() < 1e-12 {
            if o < min || o > max {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (min - o) * inv;
        let mut t2 = (max - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_max < t_min {
            return None;
        }
    }

    Some(t_min)
}
