//! Tempo-synced feedback delay.
//!
//! A single mono delay line fed by the channel average and added back to
//! every output channel. The line is sized once at construction; retiming
//! only moves the read distance.

use crate::config::EchoConfig;

const MAX_FEEDBACK: f32 = 0.95;

/// Feedback delay whose time follows the transport tempo.
pub struct Echo {
    enabled: bool,
    line: Vec<f32>,
    write: usize,
    delay_frames: usize,
    /// Delay length in grid steps
    steps: f32,
    feedback: f32,
    mix: f32,
    output_rate: u32,
}

impl Echo {
    pub fn new(config: &EchoConfig, output_rate: u32, step_duration: f64) -> Self {
        let capacity = (config.max_seconds.max(0.0) as f64 * output_rate as f64).ceil() as usize + 1;
        let mut echo = Self {
            enabled: config.enabled,
            line: vec![0.0; capacity.max(2)],
            write: 0,
            delay_frames: 1,
            steps: config.steps,
            feedback: config.feedback.clamp(0.0, MAX_FEEDBACK),
            mix: config.mix.max(0.0),
            output_rate,
        };
        echo.set_step_duration(step_duration);
        echo
    }

    /// Retime the delay to `steps × step_duration`, clamped to the line length.
    pub fn set_step_duration(&mut self, step_duration: f64) {
        let secs = self.steps as f64 * step_duration;
        let frames = (secs * self.output_rate as f64).round();
        let max = self.line.len() - 1;
        self.delay_frames = if frames.is_finite() {
            (frames as usize).clamp(1, max)
        } else {
            max
        };
    }

    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }

    /// Clear the delay line.
    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.write = 0;
    }

    /// Add the delayed signal to an interleaved buffer in place.
    pub fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if !self.enabled || channels == 0 {
            return;
        }
        let len = self.line.len();
        let inv_channels = 1.0 / channels as f32;

        for frame in buffer.chunks_exact_mut(channels) {
            let read = (self.write + len - self.delay_frames) % len;
            let delayed = self.line[read];
            let dry: f32 = frame.iter().sum::<f32>() * inv_channels;

            let mut next = dry + delayed * self.feedback;
            if !next.is_finite() {
                next = 0.0;
            }
            self.line[self.write] = next;
            self.write = (self.write + 1) % len;

            let wet = delayed * self.mix;
            for s in frame {
                *s += wet;
            }
        }
    }
}
