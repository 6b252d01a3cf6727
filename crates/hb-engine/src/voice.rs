//! Voice: one in-flight instance of sample playback.

use hb_ir::{Sample, SampleKey};

/// Per-buffer mixing parameters shared by every voice.
#[derive(Clone, Copy, Debug)]
pub struct MixParams {
    /// Output frame rate in Hz.
    pub output_rate: u32,
    /// Master gain, already divided by the active voice count when normalizing.
    pub gain: f32,
    /// Fade length before the sample's natural end, in source frames.
    pub fade_out_samples: usize,
}

/// A single voice reading a sample at a fractional position.
#[derive(Clone, Debug)]
pub struct Voice {
    /// Which sample this voice plays.
    pub sample_key: SampleKey,
    /// Fractional frame index into the sample.
    pub position: f64,
    /// Is the voice currently producing audio?
    pub active: bool,
    /// Sample gain captured at trigger time.
    pub gain: f32,
    /// Pitch shift as a playback-rate multiplier (1.0 = unison).
    pub pitch_multiplier: f32,
    /// Frame rate of the sample data.
    pub source_rate: u32,
}

impl Voice {
    /// Create a voice at the start of `sample`.
    pub fn new(sample_key: SampleKey, sample: &Sample, pitch_multiplier: f32) -> Self {
        Self {
            sample_key,
            position: 0.0,
            active: true,
            gain: sample.gain,
            pitch_multiplier,
            source_rate: sample.source_rate,
        }
    }

    /// Rewind to the start with a new pitch.
    pub fn restart(&mut self, pitch_multiplier: f32) {
        self.position = 0.0;
        self.pitch_multiplier = pitch_multiplier;
        self.active = true;
    }

    /// Source frames consumed per output frame.
    ///
    /// Folds pitch shift and source/output rate conversion into one step.
    pub fn increment(&self, output_rate: u32) -> f64 {
        if output_rate == 0 {
            return 0.0;
        }
        self.pitch_multiplier as f64 * self.source_rate as f64 / output_rate as f64
    }

    /// Mix this voice into an interleaved buffer of `channels` channels.
    /// Adds (sums) into the buffer; deactivates the voice at the sample end.
    pub fn render_with_source(
        &mut self,
        sample: &Sample,
        output: &mut [f32],
        channels: usize,
        params: &MixParams,
    ) {
        if !self.active || channels == 0 {
            return;
        }

        let increment = self.increment(params.output_rate);
        if !(increment.is_finite() && increment > 0.0) {
            self.active = false;
            return;
        }

        let frame_count = sample.len() as f64;
        let fade = params.fade_out_samples as f64;
        let scale = params.gain * self.gain;

        for frame in output.chunks_exact_mut(channels) {
            if self.position >= frame_count {
                self.active = false;
                break;
            }

            let mut value = sample.read_interpolated(self.position);
            let remaining = frame_count - self.position;
            if remaining < fade {
                value *= (remaining / fade) as f32;
            }

            self.position += increment;

            let contribution = value * scale;
            for out in frame {
                *out += contribution;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_ir::SampleBank;

    const RATE: u32 = 44100;

    fn params(gain: f32, fade: usize) -> MixParams {
        MixParams {
            output_rate: RATE,
            gain,
            fade_out_samples: fade,
        }
    }

    fn dc_sample(len: usize) -> (SampleKey, Sample) {
        let sample = Sample::from_frames("dc", vec![0.5; len], RATE);
        let mut bank = SampleBank::new();
        let key = bank.insert(sample.clone());
        (key, sample)
    }

    #[test]
    fn voice_render_writes_every_channel() {
        let (key, sample) = dc_sample(100);
        let mut voice = Voice::new(key, &sample, 1.0);
        let mut buf = [0.0f32; 8];
        voice.render_with_source(&sample, &mut buf, 2, &params(1.0, 0));
        assert!(buf.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn voice_render_sums_into_buffer() {
        let (key, sample) = dc_sample(100);
        let mut voice = Voice::new(key, &sample, 1.0);
        let mut buf = [0.25f32; 4];
        voice.render_with_source(&sample, &mut buf, 1, &params(1.0, 0));
        assert!(buf.iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn voice_render_applies_gains() {
        let (key, mut sample) = dc_sample(100);
        sample.gain = 0.5;
        let mut voice = Voice::new(key, &sample, 1.0);
        let mut buf = [0.0f32; 2];
        voice.render_with_source(&sample, &mut buf, 1, &params(0.5, 0));
        assert!((buf[0] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn voice_render_silent_when_inactive() {
        let (key, sample) = dc_sample(100);
        let mut voice = Voice::new(key, &sample, 1.0);
        voice.active = false;
        let mut buf = [0.0f32; 4];
        voice.render_with_source(&sample, &mut buf, 2, &params(1.0, 0));
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voice_render_advances_by_pitch_and_rate() {
        let (key, mut sample) = dc_sample(1000);
        sample.source_rate = RATE / 2;
        let mut voice = Voice::new(key, &sample, 2.0);
        let mut buf = [0.0f32; 10];
        voice.render_with_source(&sample, &mut buf, 1, &params(1.0, 0));
        // 2.0 pitch at half the output rate = one source frame per output frame
        assert!((voice.position - 10.0).abs() < 1e-9);
    }

    #[test]
    fn voice_render_stops_at_sample_end() {
        let (key, sample) = dc_sample(4);
        let mut voice = Voice::new(key, &sample, 1.0);
        let mut buf = [0.0f32; 10];
        voice.render_with_source(&sample, &mut buf, 1, &params(1.0, 0));
        assert!(!voice.active);
        assert!(buf[..4].iter().all(|&s| s != 0.0));
        assert!(buf[4..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voice_render_fades_out_near_end() {
        let (key, sample) = dc_sample(8);
        let mut voice = Voice::new(key, &sample, 1.0);
        let mut buf = [0.0f32; 8];
        voice.render_with_source(&sample, &mut buf, 1, &params(1.0, 4));
        // frames 0..4 are outside the fade window
        assert!((buf[3] - 0.5).abs() < 1e-6);
        // remaining = 4, 3, 2, 1 -> ramp 1.0, 0.75, 0.5, 0.25
        assert!((buf[4] - 0.5).abs() < 1e-6);
        assert!((buf[5] - 0.375).abs() < 1e-6);
        assert!((buf[7] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn voice_with_zero_output_rate_deactivates() {
        let (key, sample) = dc_sample(8);
        let mut voice = Voice::new(key, &sample, 1.0);
        let mut buf = [0.0f32; 4];
        let p = MixParams { output_rate: 0, gain: 1.0, fade_out_samples: 0 };
        voice.render_with_source(&sample, &mut buf, 1, &p);
        assert!(!voice.active);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn restart_rewinds() {
        let (key, sample) = dc_sample(8);
        let mut voice = Voice::new(key, &sample, 1.0);
        voice.position = 5.5;
        voice.active = false;
        voice.restart(1.5);
        assert_eq!(voice.position, 0.0);
        assert_eq!(voice.pitch_multiplier, 1.5);
        assert!(voice.active);
    }
}
