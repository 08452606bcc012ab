//! Dense binary heightfield format.
//!
//! ```text
//! offset  size        field
//! 0       4           width  (i32 LE)
//! 4       4           height (i32 LE)
//! 8       24          minX, minY, minElevation, maxX, maxY, maxElevation (6 x f32 LE)
//! 32      w*h*4       row-major elevation samples (f32 LE)
//! ```
//!
//! Samples at or below `minElevation` are the format's no-data sentinel.

use foundation::math::Vec3;
use thiserror::Error;

pub const HEADER_LEN: usize = 32;
pub const MAX_DIMENSION: i32 = 16_384;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TerrainDecodeError {
    #[error("terrain buffer too short: {len} bytes (header alone is {} bytes)", HEADER_LEN)]
    TooShort { len: usize },
    #[error("terrain buffer length {len} is not a multiple of 4")]
    Misaligned { len: usize },
    #[error("invalid terrain dimensions {width}x{height} (allowed 1..={})", MAX_DIMENSION)]
    InvalidDimensions { width: i32, height: i32 },
    #[error("terrain samples truncated: expected {expected}, found {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("terrain buffer is {actual} bytes, layout requires exactly {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("terrain bounds are not finite")]
    NonFiniteBounds,
}

/// Decoded header. Axis order in `min`/`max` is (x, y, elevation).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TerrainHeader {
    pub width: u32,
    pub height: u32,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl TerrainHeader {
    pub fn sample_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn min_elevation(&self) -> f32 {
        self.min[2]
    }

    /// Grid spacing along x and y. Single-column or single-row grids have a
    /// zero step on that axis.
    pub fn step(&self) -> (f64, f64) {
        let step = |min: f32, max: f32, n: u32| {
            if n > 1 {
                (max as f64 - min as f64) / (n - 1) as f64
            } else {
                0.0
            }
        };
        (
            step(self.min[0], self.max[0], self.width),
            step(self.min[1], self.max[1], self.height),
        )
    }

    /// Bounding-box center in domain coordinates (east, north, elevation).
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min[0] as f64 + self.max[0] as f64) * 0.5,
            (self.min[1] as f64 + self.max[1] as f64) * 0.5,
            (self.min[2] as f64 + self.max[2] as f64) * 0.5,
        )
    }
}

/// Validated heightfield.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainGrid {
    pub header: TerrainHeader,
    pub samples: Vec<f32>,
}

impl TerrainGrid {
    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn sample(&self, col: u32, row: u32) -> f32 {
        self.samples[(row * self.header.width + col) as usize]
    }

    /// Whether a sample carries data (strictly above the declared minimum).
    pub fn is_valid(&self, col: u32, row: u32) -> bool {
        let h = self.sample(col, row);
        h.is_finite() && h > self.header.min_elevation()
    }

    pub fn valid_count(&self) -> usize {
        let min = self.header.min_elevation();
        self.samples
            .iter()
            .filter(|h| h.is_finite() && **h > min)
            .count()
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(b)
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(b)
}

/// Parse and validate a terrain buffer.
///
/// Checks run in a fixed order: minimum length, 4-byte alignment, declared
/// dimensions, sample count, then exact total length.
pub fn decode_terrain(bytes: &[u8]) -> Result<TerrainGrid, TerrainDecodeError> {
    let len = bytes.len();
    if len <= HEADER_LEN {
        return Err(TerrainDecodeError::TooShort { len });
    }
    if len % 4 != 0 {
        return Err(TerrainDecodeError::Misaligned { len });
    }

    let width = read_i32(bytes, 0);
    let height = read_i32(bytes, 4);
    if width <= 0 || height <= 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(TerrainDecodeError::InvalidDimensions { width, height });
    }

    let expected = width as usize * height as usize;
    let actual = (len - HEADER_LEN) / 4;
    if actual < expected {
        return Err(TerrainDecodeError::Truncated { expected, actual });
    }
    if actual > expected {
        return Err(TerrainDecodeError::LengthMismatch {
            expected: HEADER_LEN + expected * 4,
            actual: len,
        });
    }

    let f = |i: usize| read_f32(bytes, 8 + i * 4);
    let min = [f(0), f(1), f(2)];
    let max = [f(3), f(4), f(5)];
    if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
        return Err(TerrainDecodeError::NonFiniteBounds);
    }

    let samples = bytes[HEADER_LEN..HEADER_LEN + expected * 4]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(TerrainGrid {
        header: TerrainHeader {
            width: width as u32,
            height: height as u32,
            min,
            max,
        },
        samples,
    })
}

/// Serialize a grid back into the binary layout.
pub fn encode_terrain(grid: &TerrainGrid) -> Vec<u8> {
    let h = &grid.header;
    let mut out = Vec::with_capacity(HEADER_LEN + grid.samples.len() * 4);
    out.extend_from_slice(&(h.width as i32).to_le_bytes());
    out.extend_from_slice(&(h.height as i32).to_le_bytes());
    for v in h.min.iter().chain(h.max.iter()) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for s in &grid.samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
