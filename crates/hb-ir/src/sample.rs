//! Sample data and the sample bank.

use alloc::vec::Vec;
use arrayvec::ArrayString;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Key for referencing samples in a [`SampleBank`].
    pub struct SampleKey;
}

/// Immutable mono source audio.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<26>,
    /// Mono frames, nominally in [-1, 1]
    pub frames: Vec<f32>,
    /// Frame rate of `frames` in Hz
    pub source_rate: u32,
    /// Static playback gain
    pub gain: f32,
    /// When false, at most one instance of this sample sounds at a time
    pub allow_polyphony: bool,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            frames: Vec::new(),
            source_rate: 44100,
            gain: 1.0,
            allow_polyphony: true,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Create a sample from mono frames at the given rate.
    pub fn from_frames(name: &str, frames: Vec<f32>, source_rate: u32) -> Self {
        let mut sample = Self::new(name);
        sample.frames = frames;
        sample.source_rate = source_rate;
        sample
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Read a linearly interpolated value at a fractional frame position.
    ///
    /// Blends the floor and ceil frames. A ceil index past the end reads the
    /// last frame (no wraparound). Positions past the end return 0.
    pub fn read_interpolated(&self, position: f64) -> f32 {
        let len = self.frames.len();
        if len == 0 || position.is_nan() || position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        if idx >= len {
            return 0.0;
        }
        let frac = (position - idx as f64) as f32;
        let a = self.frames[idx];
        let b = self.frames[(idx + 1).min(len - 1)];
        a + (b - a) * frac
    }
}

/// Owns all sample data and maps voice rows to samples.
#[derive(Clone, Debug, Default)]
pub struct SampleBank {
    samples: SlotMap<SampleKey, Sample>,
    /// Sample assigned to each voice row (None = unloaded)
    rows: Vec<Option<SampleKey>>,
}

impl SampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample to the bank without assigning it to a row.
    pub fn insert(&mut self, sample: Sample) -> SampleKey {
        self.samples.insert(sample)
    }

    /// Remove a sample, clearing any row that referenced it.
    pub fn remove(&mut self, key: SampleKey) -> Option<Sample> {
        for row in &mut self.rows {
            if *row == Some(key) {
                *row = None;
            }
        }
        self.samples.remove(key)
    }

    /// Assign a sample to a voice row.
    pub fn assign(&mut self, row: usize, key: SampleKey) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, None);
        }
        self.rows[row] = Some(key);
    }

    /// Insert a sample and assign it to `row` in one go.
    pub fn load_row(&mut self, row: usize, sample: Sample) -> SampleKey {
        let key = self.insert(sample);
        self.assign(row, key);
        key
    }

    /// Clear a row's assignment (the sample stays in the bank).
    pub fn unassign(&mut self, row: usize) {
        if let Some(slot) = self.rows.get_mut(row) {
            *slot = None;
        }
    }

    pub fn get(&self, key: SampleKey) -> Option<&Sample> {
        self.samples.get(key)
    }

    /// The sample backing a voice row, if one is loaded.
    pub fn for_row(&self, row: usize) -> Option<(SampleKey, &Sample)> {
        let key = (*self.rows.get(row)?)?;
        self.samples.get(key).map(|s| (key, s))
    }

    /// Number of samples in the bank.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Sample {
        Sample::from_frames("ramp", vec![0.0, 1.0, 0.5, -0.5], 44100)
    }

    #[test]
    fn interpolated_at_integer_matches_frame() {
        let s = ramp();
        assert_eq!(s.read_interpolated(1.0), 1.0);
        assert_eq!(s.read_interpolated(3.0), -0.5);
    }

    #[test]
    fn interpolated_midpoint_averages_neighbors() {
        let s = ramp();
        assert!((s.read_interpolated(0.5) - 0.5).abs() < 1e-6);
        assert!((s.read_interpolated(1.25) - 0.875).abs() < 1e-6);
    }

    #[test]
    fn interpolated_last_frame_clamps_instead_of_wrapping() {
        let s = ramp();
        // ceil index 4 is out of bounds, so it reads frame 3 twice
        assert!((s.read_interpolated(3.5) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn interpolated_past_end_is_silent() {
        let s = ramp();
        assert_eq!(s.read_interpolated(4.0), 0.0);
        assert_eq!(s.read_interpolated(f64::NAN), 0.0);
        assert_eq!(Sample::new("empty").read_interpolated(0.0), 0.0);
    }

    #[test]
    fn bank_row_lookup() {
        let mut bank = SampleBank::new();
        let key = bank.load_row(3, ramp());
        assert_eq!(bank.for_row(3).map(|(k, _)| k), Some(key));
        assert!(bank.for_row(0).is_none());
        assert!(bank.for_row(99).is_none());
    }

    #[test]
    fn bank_remove_clears_rows() {
        let mut bank = SampleBank::new();
        let key = bank.load_row(0, ramp());
        bank.assign(1, key);
        assert!(bank.remove(key).is_some());
        assert!(bank.for_row(0).is_none());
        assert!(bank.for_row(1).is_none());
        assert!(bank.is_empty());
    }

    #[test]
    fn bank_unassign_keeps_sample() {
        let mut bank = SampleBank::new();
        let key = bank.load_row(0, ramp());
        bank.unassign(0);
        assert!(bank.for_row(0).is_none());
        assert!(bank.get(key).is_some());
    }
}
