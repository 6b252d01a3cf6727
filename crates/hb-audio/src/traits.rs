//! Audio output trait and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
    #[error("no audio device available")]
    NoDevice,
}

/// Fills one interleaved device buffer. Arguments are the buffer and its
/// channel count. Runs on the audio thread: it must not block or allocate.
pub type RenderCallback = Box<dyn FnMut(&mut [f32], usize) + Send + 'static>;

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Output frame rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Interleaved channel count of the device buffer.
    fn channels(&self) -> usize;

    /// Open the device stream, pulling audio from `render`.
    fn open(&mut self, render: RenderCallback) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}
