use std::sync::Arc;

use foundation::color::Color;

/// Tightly packed RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl Texture {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// Where a texture comes from. External textures are resolved by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    External { url: String },
    Procedural(Arc<Texture>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color: Color,
    pub diffuse: Option<TextureSource>,
    pub normal_map: Option<TextureSource>,
    /// Tiling factor shared by the diffuse and normal textures.
    pub repeat: [f32; 2],
    pub double_sided: bool,
}

impl Material {
    pub fn solid(color: Color) -> Self {
        Self {
            base_color: color,
            diffuse: None,
            normal_map: None,
            repeat: [1.0, 1.0],
            double_sided: false,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.base_color.a < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::solid(Color::WHITE)
    }
}
