//! Output stage: voice pool, echo and limiter behind one render call.

use hb_ir::SampleBank;

use crate::config::EngineConfig;
use crate::echo::Echo;
use crate::interfaces::Performer;
use crate::limiter::apply_soft_limit;
use crate::voice_pool::{TriggerOutcome, VoicePool};

/// Renders the voice pool into interleaved output buffers.
pub struct Mixer {
    pool: VoicePool,
    echo: Echo,
    /// Output frame rate in Hz
    output_rate: u32,
    master_gain: f32,
    normalize: bool,
    fade_out_samples: usize,
}

impl Mixer {
    /// Build a mixer for `output_rate`. All buffers are allocated here.
    pub fn new(config: &EngineConfig, sample_bank: SampleBank, output_rate: u32) -> Self {
        Self {
            pool: VoicePool::new(config.max_voices, sample_bank),
            echo: Echo::new(&config.echo, output_rate, config.step_duration()),
            output_rate,
            master_gain: config.master_gain,
            normalize: config.normalize,
            fade_out_samples: config.fade_out_samples,
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn echo(&self) -> &Echo {
        &self.echo
    }

    /// Start a voice. See [`VoicePool::trigger`].
    pub fn trigger(&mut self, row: usize, pitch: f32) -> TriggerOutcome {
        self.pool.trigger(row, pitch)
    }

    /// Fill `output` (interleaved, `channels` wide) with the next block.
    ///
    /// Never allocates and never fails; a trailing partial frame is zeroed.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render_block(output, channels));
        #[cfg(not(feature = "alloc_check"))]
        self.render_block(output, channels);
    }

    fn render_block(&mut self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        if channels == 0 {
            return;
        }
        self.pool.mix_into(
            output,
            channels,
            self.output_rate,
            self.master_gain,
            self.normalize,
            self.fade_out_samples,
        );
        self.echo.process(output, channels);
        apply_soft_limit(output);
    }

    /// Silence all voices and clear the echo tail.
    pub fn panic(&mut self) {
        self.pool.kill_all();
        self.echo.reset();
    }
}

impl Performer for Mixer {
    fn trigger(&mut self, voice: usize, pitch: f32) {
        self.pool.trigger(voice, pitch).log(voice);
    }

    fn tempo_changed(&mut self, _bpm: f32, step_duration: f64) {
        self.echo.set_step_duration(step_duration);
    }
}
