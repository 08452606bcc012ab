use foundation::bounds::Aabb3;
use foundation::math::Vec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ComponentBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ComponentBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_aabb(aabb: &Aabb3) -> Self {
        Self::new(Vec3::from_array(aabb.min), Vec3::from_array(aabb.max))
    }

    pub fn to_aabb(&self) -> Aabb3 {
        Aabb3::new(self.min.to_array(), self.max.to_array())
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}
