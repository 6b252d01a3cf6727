//! Monotonic time positions in seconds.

use core::ops::Sub;

/// A point on the engine's monotonic timeline, in seconds.
///
/// Produced by a time source; the transport never constructs time itself
/// beyond adding step durations to a timestamp it was given.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Timestamp {
    secs: f64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { secs: 0.0 };

    pub const fn from_secs(secs: f64) -> Self {
        Self { secs }
    }

    /// Timestamp of an absolute frame count at the given rate.
    pub fn from_frames(frames: u64, sample_rate: u32) -> Self {
        if sample_rate == 0 {
            return Self::ZERO;
        }
        Self {
            secs: frames as f64 / sample_rate as f64,
        }
    }

    pub const fn as_secs(self) -> f64 {
        self.secs
    }

    /// Add a duration in seconds.
    pub fn add_secs(self, secs: f64) -> Self {
        Self {
            secs: self.secs + secs,
        }
    }
}

impl Sub for Timestamp {
    type Output = f64;

    /// Seconds elapsed between two timestamps.
    fn sub(self, rhs: Timestamp) -> f64 {
        self.secs - rhs.secs
    }
}
