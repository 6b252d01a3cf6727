//! Step and pattern types for the voice × step grid.

use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pitch value of a freshly created step (one half octave up).
pub const DEFAULT_PITCH: f32 = 0.5;

/// Map a normalized pitch (0..=1) to a playback-rate multiplier.
///
/// 0.0 is unison, 1.0 is one octave up.
pub fn pitch_to_multiplier(pitch: f32) -> f32 {
    libm::exp2f(pitch)
}

/// A single cell of the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Step {
    /// Whether the voice fires on this step.
    pub trigger: bool,
    /// Normalized pitch offset in [0, 1].
    pub pitch: f32,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            trigger: false,
            pitch: DEFAULT_PITCH,
        }
    }
}

/// A fixed-size grid of steps, one row per voice.
///
/// Every cell always holds a valid [`Step`]; there are no absent entries.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pattern {
    voices: usize,
    steps: usize,
    /// Grid data, stored voice-major: data[voice * steps + step]
    data: Vec<Step>,
}

impl Pattern {
    /// Create a pattern filled with default steps.
    ///
    /// Panics if `voices * steps` overflows.
    pub fn new(voices: usize, steps: usize) -> Self {
        let Some(cells) = voices.checked_mul(steps) else {
            panic!("pattern of {voices}x{steps} cells overflows");
        };
        Self {
            voices,
            steps,
            data: alloc::vec![Step::default(); cells],
        }
    }

    /// Build a pattern from voice-major step data.
    ///
    /// Returns `None` when `data` does not hold exactly `voices * steps` cells.
    pub fn from_steps(voices: usize, steps: usize, data: Vec<Step>) -> Option<Self> {
        let pattern = Self { voices, steps, data };
        pattern.is_well_formed().then_some(pattern)
    }

    /// Number of voice rows.
    pub fn voices(&self) -> usize {
        self.voices
    }

    /// Steps per bar.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// True if the backing storage matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.voices.checked_mul(self.steps) == Some(self.data.len())
    }

    /// First cell whose pitch is not a finite value in [0, 1], as
    /// `(voice, step, pitch)`.
    pub fn find_invalid_pitch(&self) -> Option<(usize, usize, f32)> {
        let steps = self.steps.max(1);
        self.data
            .iter()
            .position(|cell| !(0.0..=1.0).contains(&cell.pitch))
            .map(|i| (i / steps, i % steps, self.data[i].pitch))
    }

    /// True if both patterns have the same voice and step counts.
    pub fn same_shape(&self, other: &Pattern) -> bool {
        self.voices == other.voices && self.steps == other.steps
    }

    fn index(&self, voice: usize, step: usize) -> usize {
        assert!(voice < self.voices, "voice {voice} out of range ({})", self.voices);
        assert!(step < self.steps, "step {step} out of range ({})", self.steps);
        voice * self.steps + step
    }

    /// Get a reference to a step.
    pub fn step(&self, voice: usize, step: usize) -> &Step {
        &self.data[self.index(voice, step)]
    }

    /// Get a mutable reference to a step.
    pub fn step_mut(&mut self, voice: usize, step: usize) -> &mut Step {
        let idx = self.index(voice, step);
        &mut self.data[idx]
    }

    pub fn is_step_active(&self, voice: usize, step: usize) -> bool {
        self.step(voice, step).trigger
    }

    pub fn step_pitch(&self, voice: usize, step: usize) -> f32 {
        self.step(voice, step).pitch
    }

    pub fn set_step_active(&mut self, voice: usize, step: usize, active: bool) {
        self.step_mut(voice, step).trigger = active;
    }

    /// Set a step's pitch, clamped to [0, 1].
    pub fn set_step_pitch(&mut self, voice: usize, step: usize, pitch: f32) {
        self.step_mut(voice, step).pitch = pitch.clamp(0.0, 1.0);
    }

    /// All steps of one voice row.
    pub fn voice_row(&self, voice: usize) -> &[Step] {
        let start = self.index(voice, 0);
        &self.data[start..start + self.steps]
    }

    /// Iterate `(voice, pitch)` for every voice that fires at `step`.
    pub fn active_voices(&self, step: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        assert!(step < self.steps, "step {step} out of range ({})", self.steps);
        (0..self.voices).filter_map(move |voice| {
            let cell = &self.data[voice * self.steps + step];
            cell.trigger.then_some((voice, cell.pitch))
        })
    }
}
