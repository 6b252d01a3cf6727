//! Built-in drum kit and patterns, used when no files are given.

use std::f32::consts::TAU;

use hb_formats::PatternLibrary;
use hb_ir::{Pattern, Sample, SampleBank};

const KIT_RATE: u32 = 44100;

/// Small xorshift generator so the noise voices are reproducible.
struct Noise(u32);

impl Noise {
    fn next(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

fn frames(seconds: f32) -> usize {
    (seconds * KIT_RATE as f32) as usize
}

fn kick() -> Sample {
    let mut phase = 0.0f32;
    let data = (0..frames(0.35))
        .map(|i| {
            let t = i as f32 / KIT_RATE as f32;
            let freq = 45.0 + 110.0 * (-t * 30.0).exp();
            phase += TAU * freq / KIT_RATE as f32;
            phase.sin() * (-t * 9.0).exp()
        })
        .collect();
    Sample::from_frames("kick", data, KIT_RATE)
}

fn snare() -> Sample {
    let mut noise = Noise(0x1234_5678);
    let data = (0..frames(0.2))
        .map(|i| {
            let t = i as f32 / KIT_RATE as f32;
            let body = (TAU * 190.0 * t).sin() * (-t * 25.0).exp();
            let rattle = noise.next() * (-t * 18.0).exp();
            0.5 * body + 0.6 * rattle
        })
        .collect();
    let mut sample = Sample::from_frames("snare", data, KIT_RATE);
    sample.gain = 0.8;
    sample
}

fn hat() -> Sample {
    let mut noise = Noise(0x9e37_79b9);
    let mut prev = 0.0;
    let data = (0..frames(0.06))
        .map(|i| {
            let t = i as f32 / KIT_RATE as f32;
            let n = noise.next();
            // crude high-pass
            let hp = n - prev;
            prev = n;
            hp * (-t * 60.0).exp()
        })
        .collect();
    let mut sample = Sample::from_frames("hat", data, KIT_RATE);
    sample.gain = 0.35;
    sample.allow_polyphony = false;
    sample
}

fn tone(name: &str, freq: f32, seconds: f32) -> Sample {
    let data = (0..frames(seconds))
        .map(|i| {
            let t = i as f32 / KIT_RATE as f32;
            let env = (t * 200.0).min(1.0) * (-t * 4.0).exp();
            ((TAU * freq * t).sin() + 0.3 * (TAU * 2.0 * freq * t).sin()) * env
        })
        .collect();
    let mut sample = Sample::from_frames(name, data, KIT_RATE);
    sample.gain = 0.5;
    sample.allow_polyphony = false;
    sample
}

/// Synthesized samples on rows 0..`voices`: kick, snare, hat, then tones.
pub fn synth_bank(voices: usize) -> SampleBank {
    let mut bank = SampleBank::new();
    let mut kit = vec![kick(), snare(), hat(), tone("bass", 55.0, 0.5), tone("lead", 220.0, 0.3)];
    let mut freq = 330.0;
    while kit.len() < voices {
        kit.push(tone("bell", freq, 0.4));
        freq *= 1.25;
    }
    for (row, sample) in kit.into_iter().take(voices).enumerate() {
        bank.load_row(row, sample);
    }
    bank
}

fn set(p: &mut Pattern, voice: usize, steps: impl IntoIterator<Item = usize>, pitch: f32) {
    if voice >= p.voices() {
        return;
    }
    for s in steps {
        if s < p.steps() {
            p.set_step_active(voice, s, true);
            p.set_step_pitch(voice, s, pitch);
        }
    }
}

/// Four on the floor, offbeat hats, bass on the ones.
pub fn groove(voices: usize, steps: usize) -> Pattern {
    let mut p = Pattern::new(voices, steps);
    let beat = (steps / 4).max(1);
    set(&mut p, 0, (0..steps).step_by(beat), 0.0);
    set(&mut p, 1, (beat..steps).step_by(beat * 2), 0.0);
    set(&mut p, 2, (beat / 2..steps).step_by(beat), 0.0);
    set(&mut p, 3, [0, steps / 2 + beat / 2], 0.0);
    p
}

/// A busier one-bar motif for tempo transitions.
pub fn fill(voices: usize, steps: usize) -> Pattern {
    let mut p = Pattern::new(voices, steps);
    set(&mut p, 0, [0], 0.0);
    set(&mut p, 1, steps / 2..steps, 0.0);
    for s in 0..steps {
        set(&mut p, 4, [s], s as f32 / steps as f32);
    }
    p
}

/// Sparse half-time feel.
pub fn halftime(voices: usize, steps: usize) -> Pattern {
    let mut p = Pattern::new(voices, steps);
    set(&mut p, 0, [0], 0.0);
    set(&mut p, 1, [steps / 2], 0.0);
    set(&mut p, 2, (0..steps).step_by(2), 0.0);
    set(&mut p, 5, [0, steps / 4 * 3], 0.5);
    p
}

/// Library preloaded with the built-in patterns.
pub fn library(voices: usize, steps: usize) -> PatternLibrary {
    let mut lib = PatternLibrary::new().require_shape(voices, steps);
    lib.insert("groove", groove(voices, steps));
    lib.insert("fill", fill(voices, steps));
    lib.insert("halftime", halftime(voices, steps));
    lib
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_covers_every_row() {
        let bank = synth_bank(8);
        for row in 0..8 {
            let (_, sample) = bank.for_row(row).unwrap();
            assert!(!sample.is_empty());
            assert!(sample.frames.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn patterns_fit_small_grids() {
        for (voices, steps) in [(1, 4), (3, 8), (8, 16), (8, 32)] {
            assert!(groove(voices, steps).is_well_formed());
            assert!(fill(voices, steps).is_well_formed());
            assert!(halftime(voices, steps).is_well_formed());
        }
    }

    #[test]
    fn groove_has_four_kicks() {
        let p = groove(8, 16);
        let kicks = (0..16).filter(|&s| p.is_step_active(0, s)).count();
        assert_eq!(kicks, 4);
    }
}
