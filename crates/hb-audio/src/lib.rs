//! Audio output backends for the heartbeat step sequencer.

mod cpal_backend;
mod traits;

pub use cpal_backend::CpalOutput;
pub use traits::{AudioError, AudioOutput, RenderCallback};
