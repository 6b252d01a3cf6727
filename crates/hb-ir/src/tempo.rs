//! Tempo arithmetic.

/// Seconds per grid step at `bpm`.
///
/// A bar of `steps_per_bar` steps spans `beats_per_bar` beats, so a 16-step
/// bar in 4/4 gives sixteenth notes: `15 / bpm`.
pub fn step_duration(bpm: f32, steps_per_bar: usize, beats_per_bar: usize) -> f64 {
    let steps_per_beat = steps_per_bar as f64 / beats_per_bar as f64;
    60.0 / bpm as f64 / steps_per_beat
}

/// Linear interpolation from `a` to `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteenth_note_grid() {
        for bpm in [60.0f32, 90.0, 120.0, 174.0] {
            let expected = 15.0 / bpm as f64;
            assert!((step_duration(bpm, 16, 4) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn eighth_note_grid() {
        // 8 steps over 4 beats = eighth notes
        assert!((step_duration(120.0, 8, 4) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(100.0, 140.0, 0.0), 100.0);
        assert_eq!(lerp(100.0, 140.0, 1.0), 140.0);
        assert_eq!(lerp(100.0, 140.0, 0.5), 120.0);
    }
}
