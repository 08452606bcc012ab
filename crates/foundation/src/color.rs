/// Linear RGBA color in `0..=1`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    /// Neutral gray that data sources emit when a connection type has no
    /// configured color.
    pub const PLACEHOLDER: Color = Color::from_rgb_u32(0x80_80_80);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn from_rgb_u32(rgb: u32) -> Self {
        let r = ((rgb >> 16) & 0xff) as f32 / 255.0;
        let g = ((rgb >> 8) & 0xff) as f32 / 255.0;
        let b = (rgb & 0xff) as f32 / 255.0;
        Self::rgb(r, g, b)
    }

    /// Parse `#rgb`, `#rrggbb` or `0xrrggbb`.
    pub fn from_hex_str(s: &str) -> Option<Self> {
        let s = s.trim();
        let hex = s
            .strip_prefix('#')
            .or_else(|| s.strip_prefix("0x"))
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(Self::from_rgb_u32),
            3 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                let (r, g, b) = ((v >> 8) & 0xf, (v >> 4) & 0xf, v & 0xf);
                Some(Self::from_rgb_u32((r * 17) << 16 | (g * 17) << 8 | (b * 17)))
            }
            _ => None,
        }
    }

    pub fn to_rgb_u32(self) -> u32 {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        q(self.r) << 16 | q(self.g) << 8 | q(self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.to_rgb_u32())
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Same RGB as `other`, ignoring alpha.
    pub fn same_rgb(self, other: Color) -> bool {
        self.to_rgb_u32() == other.to_rgb_u32()
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
