//! Pattern storage and sample I/O for the heartbeat step sequencer.
//!
//! Patterns are stored as JSON; samples are read from PCM WAV files and
//! rendered output is written back as 16-bit WAV.

mod library;
mod pattern_store;
mod wav_format;

use thiserror::Error;

pub use library::PatternLibrary;
pub use pattern_store::{load_pattern, pattern_from_json, pattern_to_json, save_pattern};
pub use wav_format::{load_wav, samples_to_wav, write_wav};

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid header")]
    InvalidHeader,
    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unsupported encoding (compressed WAV, 24-bit, surround)
    #[error("unsupported format: {0}")]
    Unsupported(String),
    /// Grid dimensions disagree with the stored cells
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
