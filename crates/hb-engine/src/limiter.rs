//! Soft limiter applied to the final mix.

/// Inputs beyond this magnitude already saturate to ±1 in f32.
const SATURATION_INPUT: f32 = 20.0;

/// Hyperbolic tangent soft clip, `(e^{2x} - 1) / (e^{2x} + 1)`.
///
/// NaN maps to silence; infinities saturate.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    if x.is_nan() {
        return 0.0;
    }
    let x = x.clamp(-SATURATION_INPUT, SATURATION_INPUT);
    let e2x = libm::expf(2.0 * x);
    (e2x - 1.0) / (e2x + 1.0)
}

/// Soft-clip every sample of a buffer in place.
pub fn apply_soft_limit(buffer: &mut [f32]) {
    for s in buffer {
        *s = soft_clip(*s);
    }
}
