use foundation::math::Vec3;

/// Euler rotation in radians, applied yaw (about y), then pitch (about x),
/// then roll (about z) in the entity's local frame.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotation {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn from_degrees(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self::new(pitch.to_radians(), yaw.to_radians(), roll.to_radians())
    }

    pub fn is_identity(&self) -> bool {
        self.pitch == 0.0 && self.yaw == 0.0 && self.roll == 0.0
    }

    /// Rotate a vector: `Ry(yaw) * Rx(pitch) * Rz(roll) * v`.
    pub fn apply(&self, v: Vec3) -> Vec3 {
        let (sr, cr) = self.roll.sin_cos();
        let v = Vec3::new(v.x * cr - v.y * sr, v.x * sr + v.y * cr, v.z);
        let (sp, cp) = self.pitch.sin_cos();
        let v = Vec3::new(v.x, v.y * cp - v.z * sp, v.y * sp + v.z * cp);
        let (sy, cy) = self.yaw.sin_cos();
        Vec3::new(v.x * cy + v.z * sy, v.y, -v.x * sy + v.z * cy)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Rotation,
    pub scale: Vec3,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Rotation::default(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn translate(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_uniform_scale(mut self, scale: f64) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Local point to parent space: scale, rotate, then translate.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        let scaled = Vec3::new(
            local.x * self.scale.x,
            local.y * self.scale.y,
            local.z * self.scale.z,
        );
        self.position + self.rotation.apply(scaled)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
