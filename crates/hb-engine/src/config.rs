//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating configuration or tempo values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("invalid bpm {0}: must be finite and positive")]
    InvalidBpm(f32),
    #[error("invalid {field} {value}")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("{steps_per_bar} steps per bar do not divide into {beats_per_bar} beats")]
    UnevenGrid { steps_per_bar: usize, beats_per_bar: usize },
    #[error("pattern is {voices}x{steps}, configured grid is {expected_voices}x{expected_steps}")]
    GridMismatch {
        voices: usize,
        steps: usize,
        expected_voices: usize,
        expected_steps: usize,
    },
}

/// Check that a tempo is usable.
pub fn validate_bpm(bpm: f32) -> Result<f32, ConfigError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(ConfigError::InvalidBpm(bpm))
    }
}

/// Tempo-synced feedback delay settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub enabled: bool,
    /// Delay time in grid steps (3 steps = dotted eighth on a 16th grid)
    pub steps: f32,
    /// Feedback amount, clamped to [0, 0.95]
    pub feedback: f32,
    /// Wet level added to the dry signal
    pub mix: f32,
    /// Longest delay the line can hold; sizes the buffer up front
    pub max_seconds: f32,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            steps: 3.0,
            feedback: 0.35,
            mix: 0.25,
            max_seconds: 2.0,
        }
    }
}

/// Static parameters of one engine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Voice rows in the grid (V)
    pub voices: usize,
    /// Steps per bar (S)
    pub steps_per_bar: usize,
    pub beats_per_bar: usize,
    /// Initial tempo
    pub bpm: f32,
    /// Voice pool capacity
    pub max_voices: usize,
    pub master_gain: f32,
    /// Divide each voice by the number of active voices
    pub normalize: bool,
    /// Length of the fade applied before a sample's natural end, in source frames
    pub fade_out_samples: usize,
    pub echo: EchoConfig,
    /// Frames rendered per transport quantum when rendering offline
    pub block_size: usize,
    /// Sleep between transport ticks on the live transport thread
    pub tick_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices: 8,
            steps_per_bar: 16,
            beats_per_bar: 4,
            bpm: 120.0,
            max_voices: 32,
            master_gain: 0.8,
            normalize: false,
            fade_out_samples: 64,
            echo: EchoConfig::default(),
            block_size: 256,
            tick_interval_ms: 2,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("voices", self.voices),
            ("steps_per_bar", self.steps_per_bar),
            ("beats_per_bar", self.beats_per_bar),
            ("max_voices", self.max_voices),
            ("block_size", self.block_size),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Zero(field));
            }
        }
        if self.steps_per_bar % self.beats_per_bar != 0 {
            return Err(ConfigError::UnevenGrid {
                steps_per_bar: self.steps_per_bar,
                beats_per_bar: self.beats_per_bar,
            });
        }
        validate_bpm(self.bpm)?;
        if !(self.master_gain.is_finite() && self.master_gain >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "master_gain",
                value: self.master_gain,
            });
        }
        if !(self.echo.steps.is_finite() && self.echo.steps > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "echo.steps",
                value: self.echo.steps,
            });
        }
        if !(self.echo.max_seconds.is_finite() && self.echo.max_seconds > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "echo.max_seconds",
                value: self.echo.max_seconds,
            });
        }
        Ok(())
    }

    /// Seconds per step at the configured tempo.
    pub fn step_duration(&self) -> f64 {
        hb_ir::step_duration(self.bpm, self.steps_per_bar, self.beats_per_bar)
    }
}
