//! Tempo morph: a one-bar tempo glide coupled to a pattern hand-off.
//!
//! A request arms the morph. The next bar start loads the transition
//! pattern and starts gliding from the current tempo; every step of that bar
//! moves the tempo `1/S` of the way to the target. The bar start after that
//! loads the goal pattern and lands exactly on the target tempo.

use hb_ir::{lerp, Pattern};

use crate::interfaces::{LoadError, PatternLoader};
use crate::pattern_slot::PatternHandle;

/// A pending tempo change and the two patterns that accompany it.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphRequest {
    pub target_bpm: f32,
    /// Played for the single bar of the glide
    pub transition_id: String,
    /// Installed when the glide settles
    pub goal_id: String,
}

/// Where the morph currently is.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MorphPhase {
    #[default]
    Idle,
    /// Requested, waiting for the next bar start.
    Armed(MorphRequest),
    /// Inside the morph bar.
    Gliding {
        request: MorphRequest,
        start_bpm: f32,
        step_counter: usize,
    },
}

impl MorphPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, MorphPhase::Idle)
    }
}

pub struct Morph {
    phase: MorphPhase,
    steps_per_bar: usize,
}

impl Morph {
    pub fn new(steps_per_bar: usize) -> Self {
        Self {
            phase: MorphPhase::Idle,
            steps_per_bar: steps_per_bar.max(1),
        }
    }

    pub fn phase(&self) -> &MorphPhase {
        &self.phase
    }

    /// Arm a morph. Replaces whatever was in flight, including a glide.
    pub fn request(&mut self, request: MorphRequest) {
        log::debug!(
            "morph requested: {} bpm via `{}` to `{}`",
            request.target_bpm,
            request.transition_id,
            request.goal_id
        );
        if !self.phase.is_idle() {
            log::debug!("morph request replaces one in flight");
        }
        self.phase = MorphPhase::Armed(request);
    }

    /// Tempo for the step about to be timed, while gliding.
    ///
    /// `t` runs 0, 1/S, ... (S-1)/S across the bar; the target itself is
    /// only reached when the morph settles.
    pub fn step(&mut self) -> Option<f32> {
        let MorphPhase::Gliding {
            request,
            start_bpm,
            step_counter,
        } = &mut self.phase
        else {
            return None;
        };
        let t = (*step_counter).min(self.steps_per_bar - 1) as f32 / self.steps_per_bar as f32;
        *step_counter += 1;
        Some(lerp(*start_bpm, request.target_bpm, t))
    }

    /// Bar-start hook. Returns the settled tempo when a morph completes.
    pub fn on_bar_start<L: PatternLoader + ?Sized>(
        &mut self,
        current_bpm: f32,
        loader: &mut L,
        pattern: &PatternHandle,
    ) -> Option<f32> {
        match core::mem::take(&mut self.phase) {
            MorphPhase::Idle => None,
            MorphPhase::Armed(request) => {
                install(loader, &request.transition_id, pattern);
                log::debug!(
                    "morph bar: gliding {current_bpm} -> {} bpm",
                    request.target_bpm
                );
                self.phase = MorphPhase::Gliding {
                    request,
                    start_bpm: current_bpm,
                    step_counter: 0,
                };
                None
            }
            MorphPhase::Gliding { request, .. } => {
                install(loader, &request.goal_id, pattern);
                log::debug!("morph settled at {} bpm", request.target_bpm);
                Some(request.target_bpm)
            }
        }
    }
}

/// Load `id` and swap it into the grid. Failures leave the grid as it was.
fn install<L: PatternLoader + ?Sized>(loader: &mut L, id: &str, pattern: &PatternHandle) {
    match loader.load(id).and_then(|p| check_shape(id, p, pattern)) {
        Ok(next) => {
            pattern.replace(next);
        }
        Err(err) => log::warn!("pattern load failed, keeping current pattern: {err}"),
    }
}

fn check_shape(id: &str, next: Pattern, pattern: &PatternHandle) -> Result<Pattern, LoadError> {
    let (voices, steps) = (pattern.voices(), pattern.steps());
    if next.voices() == voices && next.steps() == steps && next.is_well_formed() {
        Ok(next)
    } else {
        Err(LoadError::Shape {
            id: id.to_string(),
            voices: next.voices(),
            steps: next.steps(),
            expected_voices: voices,
            expected_steps: steps,
        })
    }
}
