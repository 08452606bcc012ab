//! Floating local origin.
//!
//! Domain coordinates arrive as East/North/Elevation meters, often hundreds of
//! kilometres from any natural origin. Everything handed to the renderer is
//! expressed relative to the first "real" coordinate seen in a run, which keeps
//! magnitudes small enough for `f32`.
//!
//! Axis convention (render space is right-handed, y up):
//! - `render.x =  east`
//! - `render.y =  elevation + ELEVATION_BIAS`
//! - `render.z = -north`

use std::sync::OnceLock;

use tracing::info;

use super::Vec3;

/// Lift applied to every elevation so layered geometry does not z-fight with
/// terrain at exactly the same height.
pub const ELEVATION_BIAS: f64 = 0.01;

/// Coordinates with a horizontal component at or below this magnitude are
/// treated as default/sentinel values and never establish the origin.
pub const LOCALITY_THRESHOLD: f64 = 1.0;

/// Holds at most one origin, first writer wins.
///
/// The cell is shareable by reference between the concurrent tasks of one
/// ingestion run. Only `reset` (which needs exclusive access) clears it.
#[derive(Debug, Default)]
pub struct OriginContext {
    origin: OnceLock<Vec3>,
}

impl OriginContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with a fixed origin, mainly for tests and replay.
    pub fn with_origin(origin: Vec3) -> Self {
        let ctx = Self::new();
        let _ = ctx.origin.set(origin);
        ctx
    }

    pub fn get(&self) -> Option<Vec3> {
        self.origin.get().copied()
    }

    /// Origin value, or the zero vector while unset.
    pub fn value(&self) -> Vec3 {
        self.get().unwrap_or(Vec3::ZERO)
    }

    pub fn is_set(&self) -> bool {
        self.origin.get().is_some()
    }

    /// Try to establish the origin from an already remapped render vector.
    ///
    /// Returns `true` only for the call that actually wrote the value.
    pub fn try_set(&self, render: Vec3) -> bool {
        if !render.is_finite() {
            return false;
        }
        let won = self.origin.set(render).is_ok();
        if won {
            info!(
                x = render.x,
                y = render.y,
                z = render.z,
                "floating origin established"
            );
        }
        won
    }

    /// Seed from a remapped vector if it is far enough from zero.
    ///
    /// Render space keeps east on `x` and north on `-z`, so the horizontal
    /// guard checks those two axes.
    pub fn seed_render(&self, render: Vec3) -> bool {
        if self.is_set() || !is_significant(render.x, -render.z) {
            return false;
        }
        self.try_set(render)
    }

    /// Full scene reset. Requires exclusive access, so it cannot race a run.
    pub fn reset(&mut self) {
        self.origin.take();
    }
}

/// Both horizontal components must clear the locality threshold.
pub fn is_significant(east: f64, north: f64) -> bool {
    east.abs() > LOCALITY_THRESHOLD && north.abs() > LOCALITY_THRESHOLD
}

/// Axis remap without origin subtraction.
#[inline]
pub fn remap(east: f64, north: f64, elevation: f64) -> Vec3 {
    Vec3::new(east, elevation + ELEVATION_BIAS, -north)
}

/// Convert a domain coordinate to render-local space.
///
/// The first coordinate passing the locality guard becomes the origin, so it
/// normalizes to exactly zero. Results depend on call order; callers must
/// feed records in a reproducible order.
pub fn normalize(ctx: &OriginContext, east: f64, north: f64, elevation: f64) -> Vec3 {
    let mapped = remap(east, north, elevation);
    if !ctx.is_set() && is_significant(east, north) {
        ctx.try_set(mapped);
    }
    mapped - ctx.value()
}

/// `normalize` for a domain point stored as `Vec3 { x: east, y: north, z: elevation }`.
#[inline]
pub fn normalize_point(ctx: &OriginContext, domain: Vec3) -> Vec3 {
    normalize(ctx, domain.x, domain.y, domain.z)
}

/// Inverse of `normalize` under the current origin.
pub fn denormalize(ctx: &OriginContext, render: Vec3) -> Vec3 {
    let mapped = render + ctx.value();
    Vec3::new(mapped.x, -mapped.z, mapped.y - ELEVATION_BIAS)
}

#[cfg(test)]
mod tests {
    use super::{ELEVATION_BIAS, OriginContext, denormalize, normalize, remap};
    use crate::math::Vec3;

    fn assert_close(a: Vec3, b: Vec3, eps: f64) {
        let d = (a - b).length();
        assert!(d <= eps, "expected {a:?} ~= {b:?} (diff {d})");
    }

    #[test]
    fn unset_origin_reads_zero() {
        let ctx = OriginContext::new();
        assert_eq!(ctx.value(), Vec3::ZERO);
        assert!(!ctx.is_set());
    }

    #[test]
    fn first_significant_coordinate_becomes_origin() {
        let ctx = OriginContext::new();

        // Sentinel-ish coordinates never establish the frame.
        let near_zero = normalize(&ctx, 0.5, 0.0, 3.0);
        assert!(!ctx.is_set());
        assert_eq!(near_zero, Vec3::new(0.5, 3.0 + ELEVATION_BIAS, 0.0));

        let first = normalize(&ctx, 512_000.0, 6_780_000.0, -120.0);
        assert_eq!(first, Vec3::ZERO);
        assert_eq!(ctx.get(), Some(remap(512_000.0, 6_780_000.0, -120.0)));
    }

    #[test]
    fn later_coordinates_are_relative_and_idempotent() {
        let ctx = OriginContext::new();
        normalize(&ctx, 512_000.0, 6_780_000.0, -120.0);

        let p = normalize(&ctx, 512_010.5, 6_780_002.25, -100.0);
        let again = normalize(&ctx, 512_010.5, 6_780_002.25, -100.0);
        assert_eq!(p, again);
        assert_eq!(p, remap(512_010.5, 6_780_002.25, -100.0) - ctx.value());
        assert_close(p, Vec3::new(10.5, 20.0, -2.25), 1e-9);
    }

    #[test]
    fn first_writer_wins() {
        let ctx = OriginContext::new();
        assert!(ctx.try_set(Vec3::new(1.0, 2.0, 3.0)));
        assert!(!ctx.try_set(Vec3::new(9.0, 9.0, 9.0)));
        assert!(!ctx.seed_render(Vec3::new(100.0, 0.0, -100.0)));
        assert_eq!(ctx.value(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn seed_render_respects_locality_guard() {
        let ctx = OriginContext::new();
        assert!(!ctx.seed_render(Vec3::new(0.2, 50.0, -0.3)));
        assert!(ctx.seed_render(Vec3::new(400_000.0, 0.0, -7_000_000.0)));
    }

    #[test]
    fn reset_clears_origin() {
        let mut ctx = OriginContext::with_origin(Vec3::new(5.0, 5.0, 5.0));
        ctx.reset();
        assert!(!ctx.is_set());
    }

    #[test]
    fn denormalize_inverts_normalize() {
        let ctx = OriginContext::new();
        normalize(&ctx, 431_000.0, 7_001_000.0, -80.0);
        let domain = Vec3::new(431_123.4, 7_000_950.5, -92.0);
        let render = normalize(&ctx, domain.x, domain.y, domain.z);
        assert_close(denormalize(&ctx, render), domain, 1e-6);
    }
}
