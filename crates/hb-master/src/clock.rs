//! Time sources for driving the transport.

use std::time::Instant;

use hb_engine::TimeSource;
use hb_ir::Timestamp;

/// Wall-clock time since construction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.origin.elapsed().as_secs_f64())
    }
}

/// Time derived from the number of frames rendered so far.
///
/// Sample-accurate, and independent of how long rendering actually takes.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    frames: u64,
    rate: u32,
}

impl FrameClock {
    pub fn new(rate: u32) -> Self {
        Self { frames: 0, rate }
    }

    pub fn advance(&mut self, frames: usize) {
        self.frames += frames as u64;
    }

    /// Whole frames from now until `at`, rounded up.
    pub fn frames_until(&self, at: Timestamp) -> usize {
        let secs = at - self.now();
        if secs <= 0.0 {
            0
        } else {
            (secs * self.rate as f64).ceil() as usize
        }
    }
}

impl TimeSource for FrameClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_frames(self.frames, self.rate)
    }
}
