//! heartbeat - generative step sequencer with tempo morphs.
//!
//! Usage:
//!   heartbeat                                  play the built-in kit live
//!   heartbeat --morph 150:fill:halftime@2      morph at bar 2
//!   heartbeat --wav out.wav --seconds 20       render offline

mod kit;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use hb_engine::{EngineConfig, PatternLoader};
use hb_formats::PatternLibrary;
use hb_ir::SampleBank;
use hb_master::Controller;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser, Debug)]
#[command(name = "heartbeat", version, about = "Generative step sequencer with tempo morphs")]
struct Args {
    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of WAV files, assigned to voice rows in name order
    #[arg(long)]
    samples: Option<PathBuf>,

    /// Directory of <id>.json patterns
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Pattern to start with
    #[arg(long, default_value = "groove")]
    start: String,

    /// Render offline to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Length of the render, or of live playback
    #[arg(long, default_value_t = 16.0)]
    seconds: f64,

    /// Output rate for offline renders
    #[arg(long, default_value_t = 44100)]
    rate: u32,

    /// Tempo morph as BPM:TRANSITION:GOAL[@BAR]; may be repeated
    #[arg(long = "morph", value_parser = parse_morph)]
    morphs: Vec<MorphArg>,
}

#[derive(Clone, Debug, PartialEq)]
struct MorphArg {
    bpm: f32,
    transition: String,
    goal: String,
    /// Bar at which the request is issued
    bar: u64,
}

fn parse_morph(s: &str) -> Result<MorphArg, String> {
    let (body, bar) = match s.split_once('@') {
        Some((body, bar)) => (
            body,
            bar.parse::<u64>().map_err(|e| format!("bad bar `{bar}`: {e}"))?,
        ),
        None => (s, 1),
    };
    let mut parts = body.splitn(3, ':');
    let (Some(bpm), Some(transition), Some(goal)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected BPM:TRANSITION:GOAL, got `{s}`"));
    };
    let bpm: f32 = bpm.parse().map_err(|e| format!("bad bpm `{bpm}`: {e}"))?;
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(format!("bpm must be positive, got {bpm}"));
    }
    if transition.is_empty() || goal.is_empty() {
        return Err("pattern ids may not be empty".into());
    }
    Ok(MorphArg {
        bpm,
        transition: transition.to_string(),
        goal: goal.to_string(),
        bar,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    config.validate().context("invalid engine configuration")?;

    let bank = match &args.samples {
        Some(dir) => load_samples(dir, config.voices)?,
        None => kit::synth_bank(config.voices),
    };

    let mut library = build_library(&args, &config);
    let initial = library
        .load(&args.start)
        .with_context(|| format!("loading start pattern `{}`", args.start))?;

    let mut ctrl = Controller::new(config, bank, initial, library)?;

    match &args.wav {
        Some(path) => render_to_wav(&mut ctrl, &args, path),
        None => play_live(&mut ctrl, &args),
    }
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_samples(dir: &Path, voices: usize) -> Result<SampleBank> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("wav")))
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("no .wav files in {}", dir.display());
    }
    if paths.len() > voices {
        log::warn!("{} samples for {voices} voices; extra files ignored", paths.len());
    }

    let mut bank = SampleBank::new();
    for (row, path) in paths.iter().take(voices).enumerate() {
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("sample");
        let sample = hb_formats::load_wav(&data, name)
            .with_context(|| format!("decoding {}", path.display()))?;
        log::info!("row {row}: {name} ({} frames @ {} Hz)", sample.len(), sample.source_rate);
        bank.load_row(row, sample);
    }
    Ok(bank)
}

/// Built-in patterns, overridden by same-named files in `--patterns`.
fn build_library(args: &Args, config: &EngineConfig) -> PatternLibrary {
    let (voices, steps) = (config.voices, config.steps_per_bar);
    let mut library = match &args.patterns {
        Some(dir) => PatternLibrary::with_dir(dir).require_shape(voices, steps),
        None => PatternLibrary::new().require_shape(voices, steps),
    };
    let builtin = kit::library(voices, steps);
    for id in builtin.ids() {
        if !library.contains(id) {
            if let Some(pattern) = builtin.get(id) {
                library.insert(id, pattern.clone());
            }
        }
    }
    library
}

fn play_live(ctrl: &mut Controller, args: &Args) -> Result<()> {
    ctrl.play().context("starting live playback")?;
    println!("Playing for {:.0} s (Ctrl-C to quit)...", args.seconds);

    let mut pending: Vec<&MorphArg> = args.morphs.iter().collect();
    pending.sort_by_key(|m| m.bar);
    let mut pending = pending.into_iter().peekable();

    let deadline = std::time::Instant::now() + Duration::from_secs_f64(args.seconds.max(0.0));
    while ctrl.is_playing() && std::time::Instant::now() < deadline {
        if let Some(pos) = ctrl.position() {
            while let Some(m) = pending.next_if(|m| m.bar <= pos.bar) {
                ctrl.request_transition(m.bpm, &m.transition, &m.goal)?;
                log::info!("morph to {} bpm via `{}` -> `{}`", m.bpm, m.transition, m.goal);
            }
            print!("\rBar: {:3} | Step: {:2} | {:6.1} bpm", pos.bar, pos.step, pos.bpm);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    ctrl.stop();
    println!("\rDone.                                ");
    Ok(())
}

fn render_to_wav(ctrl: &mut Controller, args: &Args, path: &Path) -> Result<()> {
    for m in &args.morphs {
        ctrl.schedule_transition(m.bar, m.bpm, &m.transition, &m.goal)?;
    }
    println!("Rendering {} s to {} at {} Hz...", args.seconds, path.display(), args.rate);

    let wav = ctrl.render_to_wav(args.seconds, args.rate)?;
    fs::write(path, &wav).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {} bytes.", wav.len());
    Ok(())
}
