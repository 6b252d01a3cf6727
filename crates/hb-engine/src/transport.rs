//! Transport: steps the beat grid against a monotonic clock.

use hb_ir::{step_duration, Timestamp};

use crate::config::{validate_bpm, ConfigError, EngineConfig};
use crate::interfaces::{PatternLoader, Performer};
use crate::morph::{Morph, MorphPhase, MorphRequest};
use crate::pattern_slot::PatternHandle;

/// What a single [`Transport::advance`] call played.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Grid column that was just played.
    pub step: usize,
    /// Bar the step belongs to, counted from `start`.
    pub bar: u64,
    /// The step was the first of its bar.
    pub bar_start: bool,
    /// Tempo in effect after the step.
    pub bpm: f32,
    /// Voices triggered.
    pub triggered: usize,
}

/// The sequencer clock.
///
/// Owns tempo and position, reads the shared grid on every step and drives
/// the morph state machine at step and bar boundaries. It never reads time
/// itself; callers pass `now` from a [`TimeSource`](crate::TimeSource).
pub struct Transport {
    pattern: PatternHandle,
    loader: Box<dyn PatternLoader + Send>,
    morph: Morph,
    steps_per_bar: usize,
    beats_per_bar: usize,
    bpm: f32,
    step_duration: f64,
    current_step: usize,
    bar: u64,
    next_step_time: Timestamp,
    running: bool,
}

impl Transport {
    pub fn new(
        config: &EngineConfig,
        pattern: PatternHandle,
        loader: Box<dyn PatternLoader + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if pattern.voices() != config.voices || pattern.steps() != config.steps_per_bar {
            return Err(ConfigError::GridMismatch {
                voices: pattern.voices(),
                steps: pattern.steps(),
                expected_voices: config.voices,
                expected_steps: config.steps_per_bar,
            });
        }
        Ok(Self {
            pattern,
            loader,
            morph: Morph::new(config.steps_per_bar),
            steps_per_bar: config.steps_per_bar,
            beats_per_bar: config.beats_per_bar,
            bpm: config.bpm,
            step_duration: config.step_duration(),
            current_step: 0,
            bar: 0,
            next_step_time: Timestamp::ZERO,
            running: false,
        })
    }

    pub fn pattern(&self) -> &PatternHandle {
        &self.pattern
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Seconds per step at the current tempo.
    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// Step that the next transition will play.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn bar(&self) -> u64 {
        self.bar
    }

    pub fn next_step_time(&self) -> Timestamp {
        self.next_step_time
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn morph_phase(&self) -> &MorphPhase {
        self.morph.phase()
    }

    /// Rewind to bar 0 and schedule the first step at `now`.
    ///
    /// Runs the bar-start hook for bar 0, so a morph requested before
    /// starting begins on the first bar.
    pub fn start<P: Performer + ?Sized>(&mut self, now: Timestamp, performer: &mut P) {
        self.current_step = 0;
        self.bar = 0;
        self.next_step_time = now;
        self.running = true;
        log::debug!("transport started at {} bpm", self.bpm);
        performer.tempo_changed(self.bpm, self.step_duration);
        self.bar_start(performer);
    }

    /// Stop stepping. Position, tempo and any pending morph are kept.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Set the tempo immediately, outside any morph.
    ///
    /// An active glide keeps gliding and overrides this on its next step.
    pub fn set_bpm<P: Performer + ?Sized>(
        &mut self,
        bpm: f32,
        performer: &mut P,
    ) -> Result<(), ConfigError> {
        let bpm = validate_bpm(bpm)?;
        self.apply_bpm(bpm, performer);
        Ok(())
    }

    /// Queue a morph to `target_bpm`. The last request before a bar start wins.
    pub fn request_transition(
        &mut self,
        target_bpm: f32,
        transition_id: &str,
        goal_id: &str,
    ) -> Result<(), ConfigError> {
        let target_bpm = validate_bpm(target_bpm)?;
        self.morph.request(MorphRequest {
            target_bpm,
            transition_id: transition_id.to_string(),
            goal_id: goal_id.to_string(),
        });
        Ok(())
    }

    /// Play at most one step if `now` has reached the next step time.
    ///
    /// Lost steps are never caught up: a late call plays one step and
    /// schedules the next one a step duration after the missed deadline.
    pub fn advance<P: Performer + ?Sized>(
        &mut self,
        now: Timestamp,
        performer: &mut P,
    ) -> Option<StepReport> {
        if !self.running || now < self.next_step_time {
            return None;
        }

        let step = self.current_step;
        let bar = self.bar;
        let mut triggered = 0;
        {
            let grid = self.pattern.load();
            for (voice, pitch) in grid.active_voices(step) {
                performer.trigger(voice, pitch);
                triggered += 1;
            }
        }
        if triggered > 0 {
            log::trace!("step {step}: {triggered} voices");
        }

        if let Some(bpm) = self.morph.step() {
            self.apply_bpm(bpm, performer);
        }

        self.current_step = (step + 1) % self.steps_per_bar;
        self.next_step_time = self.next_step_time.add_secs(self.step_duration);

        if self.current_step == 0 {
            self.bar += 1;
            self.bar_start(performer);
        }

        Some(StepReport {
            step,
            bar,
            bar_start: step == 0,
            bpm: self.bpm,
            triggered,
        })
    }

    fn bar_start<P: Performer + ?Sized>(&mut self, performer: &mut P) {
        if let Some(target) = self.morph.on_bar_start(self.bpm, &mut *self.loader, &self.pattern) {
            self.apply_bpm(target, performer);
        }
    }

    fn apply_bpm<P: Performer + ?Sized>(&mut self, bpm: f32, performer: &mut P) {
        self.bpm = bpm;
        self.step_duration = step_duration(bpm, self.steps_per_bar, self.beats_per_bar);
        performer.tempo_changed(bpm, self.step_duration);
    }
}
