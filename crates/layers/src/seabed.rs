//! Procedural seabed material.
//!
//! Terrain layers without their own imagery get a tileable speckled texture:
//! a base palette modulated by periodic noise bands, darkened by soft clumps,
//! then smoothed by a 3x3 wrap-around blur. Every term is periodic over the
//! tile so neighbouring repeats meet without seams.

use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::Arc;

use formats::payload::TerrainLayer;
use foundation::color::Color;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scene::components::{Material, Texture, TextureSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CLUMPS_PER_TILE: usize = 40;

/// Integer wave vectors (cycles per tile). Integers keep each band periodic;
/// mixing both axes keeps the bands off the texel grid.
const BANDS: [([i32; 2], f64); 4] = [
    ([3, 2], 0.45),
    ([-5, 7], 0.25),
    ([11, -13], 0.18),
    ([23, 19], 0.12),
];

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeabedStyle {
    #[default]
    Sand,
    Mud,
    Gravel,
    Silt,
}

impl SeabedStyle {
    /// Unknown or missing keys fall back to the default style.
    pub fn from_key(key: Option<&str>) -> Self {
        let Some(key) = key else {
            return Self::default();
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "sand" | "sandy" => SeabedStyle::Sand,
            "mud" | "clay" => SeabedStyle::Mud,
            "gravel" | "rock" => SeabedStyle::Gravel,
            "silt" => SeabedStyle::Silt,
            other => {
                debug!(style = other, "unknown seabed style; using default");
                Self::default()
            }
        }
    }

    fn palette(self) -> Palette {
        match self {
            SeabedStyle::Sand => Palette {
                dark: [0.55, 0.49, 0.38],
                light: [0.80, 0.74, 0.60],
                clump_strength: 0.30,
                seed: 0x5a4d,
            },
            SeabedStyle::Mud => Palette {
                dark: [0.24, 0.22, 0.18],
                light: [0.42, 0.38, 0.30],
                clump_strength: 0.25,
                seed: 0x4d55,
            },
            SeabedStyle::Gravel => Palette {
                dark: [0.36, 0.35, 0.33],
                light: [0.66, 0.64, 0.60],
                clump_strength: 0.45,
                seed: 0x4752,
            },
            SeabedStyle::Silt => Palette {
                dark: [0.44, 0.43, 0.38],
                light: [0.64, 0.62, 0.55],
                clump_strength: 0.20,
                seed: 0x5349,
            },
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Palette {
    dark: [f64; 3],
    light: [f64; 3],
    clump_strength: f64,
    seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeabedTextures {
    pub diffuse: Arc<Texture>,
    /// Tangent-space normal detail derived from the diffuse luminance.
    pub normal: Arc<Texture>,
}

/// Builds terrain materials, caching generated textures per (style, size).
#[derive(Debug)]
pub struct ProceduralMaterialBuilder {
    size: u32,
    repeat: f32,
    cache: Mutex<HashMap<(SeabedStyle, u32), SeabedTextures>>,
}

impl ProceduralMaterialBuilder {
    pub fn new(size: u32, repeat: f32) -> Self {
        Self {
            size: size.max(8),
            repeat,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn textures(&self, style: SeabedStyle) -> SeabedTextures {
        let key = (style, self.size);
        if let Some(hit) = self.cache.lock().get(&key) {
            return hit.clone();
        }
        let diffuse = generate_diffuse(style, self.size);
        let normal = derive_normal_map(&diffuse, 2.0);
        let textures = SeabedTextures {
            diffuse: Arc::new(diffuse),
            normal: Arc::new(normal),
        };
        self.cache.lock().insert(key, textures.clone());
        textures
    }

    /// Material for a terrain layer.
    ///
    /// External imagery takes precedence over procedural textures. Whatever
    /// the sources, diffuse and normal share one repeat factor.
    pub fn material_for(&self, layer: &TerrainLayer) -> Material {
        let repeat = layer
            .texture_repeat
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.repeat);

        let needs_procedural = layer.texture_url.is_none() || layer.normal_map_url.is_none();
        let procedural = needs_procedural
            .then(|| self.textures(SeabedStyle::from_key(layer.seabed_style_key.as_deref())));

        let diffuse = match (&layer.texture_url, &procedural) {
            (Some(url), _) => Some(TextureSource::External { url: url.clone() }),
            (None, Some(p)) => Some(TextureSource::Procedural(p.diffuse.clone())),
            (None, None) => None,
        };
        let normal_map = match (&layer.normal_map_url, &procedural) {
            (Some(url), _) => Some(TextureSource::External { url: url.clone() }),
            (None, Some(p)) => Some(TextureSource::Procedural(p.normal.clone())),
            (None, None) => None,
        };

        let alpha = layer.opacity.map(|o| o.clamp(0.0, 1.0)).unwrap_or(1.0);
        Material {
            base_color: Color::WHITE.with_alpha(alpha),
            diffuse,
            normal_map,
            repeat: [repeat, repeat],
            double_sided: false,
        }
    }
}

impl Default for ProceduralMaterialBuilder {
    fn default() -> Self {
        Self::new(256, 8.0)
    }
}

struct Clump {
    center: [f64; 2],
    radius: f64,
}

/// Shortest distance between two points on the unit torus.
fn toroidal_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let wrap = |d: f64| {
        let d = d.abs().rem_euclid(1.0);
        d.min(1.0 - d)
    };
    let dx = wrap(a[0] - b[0]);
    let dy = wrap(a[1] - b[1]);
    (dx * dx + dy * dy).sqrt()
}

fn generate_diffuse(style: SeabedStyle, size: u32) -> Texture {
    let palette = style.palette();
    let mut rng = StdRng::seed_from_u64(palette.seed);
    let phases: Vec<f64> = BANDS.iter().map(|_| rng.gen_range(0.0..TAU)).collect();
    let clumps: Vec<Clump> = (0..CLUMPS_PER_TILE)
        .map(|_| Clump {
            center: [rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)],
            radius: rng.gen_range(0.015..0.06),
        })
        .collect();
    let amplitude: f64 = BANDS.iter().map(|(_, a)| a).sum();

    let n = size as usize;
    let mut shade = vec![0.0f64; n * n];
    for y in 0..n {
        for x in 0..n {
            let uv = [x as f64 / n as f64, y as f64 / n as f64];
            let mut noise = 0.0;
            for (([kx, ky], amp), phase) in BANDS.iter().zip(&phases) {
                let arg = TAU * (*kx as f64 * uv[0] + *ky as f64 * uv[1]) + phase;
                noise += amp * arg.sin();
            }
            let mut value = 0.5 + 0.5 * noise / amplitude;

            for clump in &clumps {
                let d = toroidal_distance(uv, clump.center);
                if d < clump.radius {
                    let falloff = 1.0 - d / clump.radius;
                    value *= 1.0 - palette.clump_strength * falloff * falloff;
                }
            }
            shade[y * n + x] = value.clamp(0.0, 1.0);
        }
    }

    let shade = blur_wrap(&shade, n);
    let pixels = shade
        .iter()
        .map(|t| {
            let c = |k: usize| {
                let v = palette.dark[k] + (palette.light[k] - palette.dark[k]) * t;
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            };
            [c(0), c(1), c(2), 255]
        })
        .collect();
    Texture::new(size, size, pixels)
}

/// 3x3 box blur with periodic boundaries.
fn blur_wrap(src: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; src.len()];
    for y in 0..n {
        for x in 0..n {
            let mut acc = 0.0;
            for dy in [n - 1, 0, 1] {
                for dx in [n - 1, 0, 1] {
                    acc += src[((y + dy) % n) * n + (x + dx) % n];
                }
            }
            out[y * n + x] = acc / 9.0;
        }
    }
    out
}

fn luminance(p: [u8; 4]) -> f64 {
    (0.2126 * p[0] as f64 + 0.7152 * p[1] as f64 + 0.0722 * p[2] as f64) / 255.0
}

/// Sobel over luminance, wrapping at the edges, encoded as RGB = n * 0.5 + 0.5.
fn derive_normal_map(diffuse: &Texture, strength: f64) -> Texture {
    let (w, h) = (diffuse.width, diffuse.height);
    let lum = |x: u32, y: u32| luminance(diffuse.pixel(x % w, y % h));
    let mut pixels = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let (xl, xr) = (x + w - 1, x + 1);
            let (yu, yd) = (y + h - 1, y + 1);
            let gx = (lum(xr, yu) + 2.0 * lum(xr, y) + lum(xr, yd))
                - (lum(xl, yu) + 2.0 * lum(xl, y) + lum(xl, yd));
            let gy = (lum(xl, yd) + 2.0 * lum(x, yd) + lum(xr, yd))
                - (lum(xl, yu) + 2.0 * lum(x, yu) + lum(xr, yu));
            let (nx, ny, nz) = (-gx * strength, -gy * strength, 1.0);
            let len = (nx * nx + ny * ny + nz * nz).sqrt();
            let enc = |v: f64| ((v / len * 0.5 + 0.5) * 255.0).round() as u8;
            pixels.push([enc(nx), enc(ny), enc(nz), 255]);
        }
    }
    Texture::new(w, h, pixels)
}
