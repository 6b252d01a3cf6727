//! Collaborators injected into the engine at construction.

use hb_ir::{Pattern, Timestamp};
use thiserror::Error;

/// Supplies monotonic time to the transport.
pub trait TimeSource {
    /// Current time. Must never decrease between calls.
    fn now(&self) -> Timestamp;
}

/// Receives the transport's output: voice triggers and tempo changes.
pub trait Performer {
    /// Start playback of the sample behind voice row `voice` at `pitch` (0..=1).
    fn trigger(&mut self, voice: usize, pitch: f32);

    /// Tempo changed; tempo-bound parameters should follow.
    fn tempo_changed(&mut self, _bpm: f32, _step_duration: f64) {}
}

impl<P: Performer + ?Sized> Performer for &mut P {
    fn trigger(&mut self, voice: usize, pitch: f32) {
        (**self).trigger(voice, pitch);
    }

    fn tempo_changed(&mut self, bpm: f32, step_duration: f64) {
        (**self).tempo_changed(bpm, step_duration);
    }
}

/// Why a pattern could not be loaded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("unknown pattern `{0}`")]
    UnknownId(String),
    #[error("malformed pattern `{id}`: {reason}")]
    Malformed { id: String, reason: String },
    #[error("pattern `{id}` is {voices}x{steps}, engine grid is {expected_voices}x{expected_steps}")]
    Shape {
        id: String,
        voices: usize,
        steps: usize,
        expected_voices: usize,
        expected_steps: usize,
    },
}

/// Resolves pattern ids to grids at morph bar boundaries.
pub trait PatternLoader {
    fn load(&mut self, id: &str) -> Result<Pattern, LoadError>;
}
