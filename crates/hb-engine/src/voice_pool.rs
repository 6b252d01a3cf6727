//! VoicePool: fixed-capacity voice allocation and mixing.

use hb_ir::{pitch_to_multiplier, SampleBank};

use crate::voice::{MixParams, Voice};

/// Identifier for a voice slot in the pool.
pub type VoiceId = usize;

/// What a trigger did to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A free slot was filled.
    Started(VoiceId),
    /// A monophonic sample's playing voice was rewound in place.
    Restarted(VoiceId),
    /// The pool was full; the first slot was reclaimed.
    Stolen(VoiceId),
    /// No sample is loaded for the requested row.
    NoSample,
}

impl TriggerOutcome {
    /// Log steals and ignored triggers for voice row `row`.
    ///
    /// Kept apart from [`VoicePool::trigger`] so callers can log after
    /// releasing whatever lock guards the pool.
    pub fn log(self, row: usize) {
        match self {
            TriggerOutcome::Stolen(id) => {
                log::debug!("voice pool full, stole slot {id} for row {row}")
            }
            TriggerOutcome::NoSample => log::trace!("no sample for voice row {row}, trigger ignored"),
            TriggerOutcome::Started(_) | TriggerOutcome::Restarted(_) => {}
        }
    }
}

/// Pool of voice slots plus the sample bank they read from.
///
/// All slots are allocated up front, so triggering and rendering never
/// touch the heap.
pub struct VoicePool {
    /// Voice slots in pool order (None = never used).
    slots: Vec<Option<Voice>>,
    /// Sample bank (owns all sample data).
    sample_bank: SampleBank,
}

impl VoicePool {
    /// Create a pool with `capacity` slots (at least one).
    pub fn new(capacity: usize, sample_bank: SampleBank) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
            sample_bank,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn sample_bank(&self) -> &SampleBank {
        &self.sample_bank
    }

    /// Mutable bank access for loading samples (not for the audio thread).
    pub fn sample_bank_mut(&mut self) -> &mut SampleBank {
        &mut self.sample_bank
    }

    /// Start the sample assigned to voice row `row` at `pitch` (0..=1).
    ///
    /// Monophonic samples restart their sounding voice instead of taking a
    /// new slot. A full pool always reclaims slot 0, regardless of age.
    pub fn trigger(&mut self, row: usize, pitch: f32) -> TriggerOutcome {
        let Some((key, sample)) = self.sample_bank.for_row(row) else {
            return TriggerOutcome::NoSample;
        };
        if sample.is_empty() {
            return TriggerOutcome::NoSample;
        }

        let pitch_multiplier = pitch_to_multiplier(pitch);

        if !sample.allow_polyphony {
            let sounding = self.slots.iter_mut().enumerate().find_map(|(id, slot)| {
                slot.as_mut()
                    .filter(|v| v.active && v.sample_key == key)
                    .map(|v| (id, v))
            });
            if let Some((id, voice)) = sounding {
                voice.restart(pitch_multiplier);
                return TriggerOutcome::Restarted(id);
            }
        }

        let voice = Voice::new(key, sample, pitch_multiplier);

        if let Some(id) = self.slots.iter().position(|s| s.as_ref().map_or(true, |v| !v.active)) {
            self.slots[id] = Some(voice);
            return TriggerOutcome::Started(id);
        }

        self.slots[0] = Some(voice);
        TriggerOutcome::Stolen(0)
    }

    /// Get a reference to a voice.
    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    /// Get a mutable reference to a voice.
    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    /// Silence a voice immediately.
    pub fn kill(&mut self, id: VoiceId) {
        if let Some(voice) = self.get_mut(id) {
            voice.active = false;
        }
    }

    /// Silence every voice.
    pub fn kill_all(&mut self) {
        for voice in self.slots.iter_mut().flatten() {
            voice.active = false;
        }
    }

    /// Count of voices currently producing audio.
    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().filter(|v| v.active).count()
    }

    /// Mix all active voices into an interleaved buffer.
    ///
    /// Sums into `output` without clearing it. With `normalize`, each voice is
    /// divided by the number of voices active at the start of the buffer.
    pub fn mix_into(
        &mut self,
        output: &mut [f32],
        channels: usize,
        output_rate: u32,
        master_gain: f32,
        normalize: bool,
        fade_out_samples: usize,
    ) {
        let gain = if normalize {
            master_gain / self.active_count().max(1) as f32
        } else {
            master_gain
        };
        let params = MixParams {
            output_rate,
            gain,
            fade_out_samples,
        };

        let bank = &self.sample_bank;
        for voice in self.slots.iter_mut().flatten() {
            if !voice.active {
                continue;
            }
            match bank.get(voice.sample_key) {
                Some(sample) => voice.render_with_source(sample, output, channels, &params),
                None => voice.active = false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_ir::Sample;

    const RATE: u32 = 44100;

    fn sample(len: usize, polyphonic: bool) -> Sample {
        let mut s = Sample::from_frames("test", vec![0.5; len], RATE);
        s.allow_polyphony = polyphonic;
        s
    }

    fn pool_with(capacity: usize, rows: &[(usize, Sample)]) -> VoicePool {
        let mut bank = SampleBank::new();
        for (row, s) in rows {
            bank.load_row(*row, s.clone());
        }
        VoicePool::new(capacity, bank)
    }

    fn mix(pool: &mut VoicePool, buf: &mut [f32], normalize: bool) {
        pool.mix_into(buf, 1, RATE, 1.0, normalize, 0);
    }

    // === Allocation tests ===

    #[test]
    fn pool_new_is_empty() {
        let pool = VoicePool::new(8, SampleBank::new());
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn zero_capacity_still_has_one_slot() {
        let pool = VoicePool::new(0, SampleBank::new());
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn trigger_without_sample_is_noop() {
        let mut pool = pool_with(4, &[]);
        assert_eq!(pool.trigger(3, 0.5), TriggerOutcome::NoSample);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn trigger_empty_sample_is_noop() {
        let mut pool = pool_with(4, &[(0, Sample::new("empty"))]);
        assert_eq!(pool.trigger(0, 0.5), TriggerOutcome::NoSample);
    }

    #[test]
    fn trigger_sets_voice_fields() {
        let mut s = sample(100, true);
        s.gain = 0.7;
        s.source_rate = 22050;
        let mut pool = pool_with(4, &[(0, s)]);
        let TriggerOutcome::Started(id) = pool.trigger(0, 1.0) else {
            panic!("expected a fresh voice");
        };
        let voice = pool.get(id).unwrap();
        assert_eq!(voice.position, 0.0);
        assert_eq!(voice.gain, 0.7);
        assert_eq!(voice.source_rate, 22050);
        assert!((voice.pitch_multiplier - 2.0).abs() < 1e-6);
    }

    #[test]
    fn polyphonic_triggers_take_separate_slots() {
        let mut pool = pool_with(4, &[(0, sample(100, true))]);
        assert_eq!(pool.trigger(0, 0.5), TriggerOutcome::Started(0));
        assert_eq!(pool.trigger(0, 0.5), TriggerOutcome::Started(1));
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn monophonic_retrigger_restarts_in_place() {
        let mut pool = pool_with(4, &[(0, sample(1000, false))]);
        assert_eq!(pool.trigger(0, 0.0), TriggerOutcome::Started(0));

        let mut buf = [0.0f32; 100];
        mix(&mut pool, &mut buf, false);
        assert!(pool.get(0).unwrap().position > 0.0);

        assert_eq!(pool.trigger(0, 1.0), TriggerOutcome::Restarted(0));
        let voice = pool.get(0).unwrap();
        assert_eq!(voice.position, 0.0);
        assert!((voice.pitch_multiplier - 2.0).abs() < 1e-6);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn monophonic_sample_after_finish_takes_free_slot() {
        let mut pool = pool_with(4, &[(0, sample(4, false))]);
        pool.trigger(0, 0.0);
        let mut buf = [0.0f32; 16];
        mix(&mut pool, &mut buf, false);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.trigger(0, 0.0), TriggerOutcome::Started(0));
    }

    #[test]
    fn full_pool_steals_first_slot() {
        let mut pool = pool_with(4, &[(0, sample(1000, true)), (1, sample(1000, true))]);
        for _ in 0..4 {
            pool.trigger(0, 0.0);
        }
        assert_eq!(pool.active_count(), 4);

        assert_eq!(pool.trigger(1, 0.25), TriggerOutcome::Stolen(0));
        assert_eq!(pool.active_count(), 4);
        let key1 = pool.sample_bank().for_row(1).unwrap().0;
        assert_eq!(pool.get(0).unwrap().sample_key, key1);
    }

    #[test]
    fn stealing_is_always_slot_zero() {
        let mut pool = pool_with(2, &[(0, sample(1000, true))]);
        pool.trigger(0, 0.0);
        pool.trigger(0, 0.0);
        for _ in 0..5 {
            assert_eq!(pool.trigger(0, 0.0), TriggerOutcome::Stolen(0));
        }
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn finished_slot_is_reused_before_stealing() {
        let mut pool = pool_with(2, &[(0, sample(1000, true))]);
        pool.trigger(0, 0.0);
        pool.trigger(0, 0.0);
        pool.kill(1);
        assert_eq!(pool.trigger(0, 0.0), TriggerOutcome::Started(1));
    }

    #[test]
    fn kill_all_silences_everything() {
        let mut pool = pool_with(4, &[(0, sample(1000, true))]);
        pool.trigger(0, 0.0);
        pool.trigger(0, 0.0);
        pool.kill_all();
        assert_eq!(pool.active_count(), 0);
    }

    // === Render tests ===

    #[test]
    fn pool_render_silent_when_empty() {
        let mut pool = pool_with(4, &[]);
        let mut buf = [0.0f32; 8];
        mix(&mut pool, &mut buf, true);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pool_render_sums_voices() {
        let mut pool = pool_with(4, &[(0, sample(100, true))]);
        pool.trigger(0, 0.0);
        pool.trigger(0, 0.0);
        let mut buf = [0.0f32; 4];
        mix(&mut pool, &mut buf, false);
        assert!(buf.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn pool_render_normalizes_by_active_count() {
        let mut pool = pool_with(4, &[(0, sample(100, true))]);
        pool.trigger(0, 0.0);
        pool.trigger(0, 0.0);
        let mut buf = [0.0f32; 4];
        mix(&mut pool, &mut buf, true);
        assert!(buf.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn double_pitch_finishes_in_half_the_frames() {
        let len = 1000;
        let mut unison = pool_with(1, &[(0, sample(len, true))]);
        let mut octave = pool_with(1, &[(0, sample(len, true))]);
        unison.trigger(0, 0.0);
        octave.trigger(0, 1.0);

        let frames_until_done = |pool: &mut VoicePool| {
            let mut frames = 0;
            let mut buf = [0.0f32; 1];
            while pool.active_count() > 0 {
                mix(pool, &mut buf, false);
                frames += 1;
                assert!(frames < 10 * len, "voice never finished");
            }
            frames
        };

        let unison_frames = frames_until_done(&mut unison);
        let octave_frames = frames_until_done(&mut octave);
        // one extra call is needed to observe the end position
        assert_eq!(unison_frames, len + 1);
        assert!(octave_frames.abs_diff(len / 2 + 1) <= 1, "octave took {octave_frames} frames");
    }

    #[test]
    fn pool_render_stops_voice_with_missing_sample() {
        let mut pool = pool_with(4, &[(0, sample(100, true))]);
        pool.trigger(0, 0.0);
        let key = pool.sample_bank().for_row(0).unwrap().0;
        pool.sample_bank_mut().remove(key);
        let mut buf = [0.0f32; 4];
        mix(&mut pool, &mut buf, false);
        assert!(!pool.get(0).unwrap().active);
        assert!(buf.iter().all(|&s| s == 0.0));
    }
}
