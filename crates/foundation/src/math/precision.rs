//! Precision policies.
//!
//! Domain coordinates (UTM-like eastings/northings) stay `f64` end to end on
//! the CPU. Only render-local offsets, expressed relative to the floating
//! origin, are narrowed to `f32`.

use core::cmp::Ordering;

use super::Vec3;

/// Largest render-local magnitude (meters) at which `f32` still resolves
/// about one millimetre.
pub const F32_MILLIMETRE_RANGE: f64 = 16_384.0;

/// Whether `local` can be narrowed to `f32` without losing millimetres.
pub fn fits_f32_millimetres(local: Vec3) -> bool {
    local.x.abs() <= F32_MILLIMETRE_RANGE
        && local.y.abs() <= F32_MILLIMETRE_RANGE
        && local.z.abs() <= F32_MILLIMETRE_RANGE
}

/// `-0.0` becomes `0.0` and every NaN the same NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for hit distances and split keys.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}
