//! Headless controller for the heartbeat step sequencer.
//!
//! Wires the engine to its collaborators: a live transport thread feeding a
//! cpal stream, or a sample-accurate offline renderer. Both the CLI and the
//! integration tests go through [`Controller`].

mod clock;
mod shared;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use hb_audio::{AudioError, AudioOutput, CpalOutput};
use hb_engine::{
    validate_bpm, ConfigError, EngineConfig, Mixer, PatternHandle, PatternLoader, StepReport,
    TimeSource, Transport,
};
use hb_ir::{Pattern, SampleBank};
use thiserror::Error;

pub use clock::{FrameClock, MonotonicClock};
pub use shared::{SharedLoader, SharedMixer};

/// Error type for controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Format(#[from] hb_formats::FormatError),
    #[error("transport thread exited before playback started")]
    TransportExited,
    #[error("invalid render request: {0}")]
    Render(&'static str),
}

/// Where live playback currently is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Last step played
    pub step: usize,
    pub bar: u64,
    pub bpm: f32,
}

/// A morph request issued at the start of a given bar of an offline render.
///
/// The glide then occupies the following bar.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledTransition {
    pub bar: u64,
    pub bpm: f32,
    pub transition_id: String,
    pub goal_id: String,
}

enum Command {
    Transition {
        bpm: f32,
        transition_id: String,
        goal_id: String,
    },
    SetBpm(f32),
    Stop,
}

/// Published by the transport thread, read by anyone.
struct Status {
    step: AtomicUsize,
    bar: AtomicU64,
    bpm_bits: AtomicU32,
    finished: AtomicBool,
}

impl Status {
    fn new(bpm: f32) -> Self {
        Self {
            step: AtomicUsize::new(0),
            bar: AtomicU64::new(0),
            bpm_bits: AtomicU32::new(bpm.to_bits()),
            finished: AtomicBool::new(false),
        }
    }

    fn publish(&self, report: &StepReport) {
        self.step.store(report.step, Ordering::Relaxed);
        self.bar.store(report.bar, Ordering::Relaxed);
        self.bpm_bits.store(report.bpm.to_bits(), Ordering::Relaxed);
    }

    fn position(&self) -> Position {
        Position {
            step: self.step.load(Ordering::Relaxed),
            bar: self.bar.load(Ordering::Relaxed),
            bpm: f32::from_bits(self.bpm_bits.load(Ordering::Relaxed)),
        }
    }
}

struct PlaybackHandle {
    commands: Sender<Command>,
    status: Arc<Status>,
    thread: Option<JoinHandle<()>>,
}

/// Owns the engine configuration, samples, grid and pattern loader, and
/// runs playback live or offline.
pub struct Controller {
    config: EngineConfig,
    bank: SampleBank,
    pattern: PatternHandle,
    loader: SharedLoader,
    scheduled: Vec<ScheduledTransition>,
    playback: Option<PlaybackHandle>,
}

impl Controller {
    pub fn new(
        config: EngineConfig,
        bank: SampleBank,
        initial: Pattern,
        loader: impl PatternLoader + Send + 'static,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        if initial.voices() != config.voices
            || initial.steps() != config.steps_per_bar
            || !initial.is_well_formed()
        {
            return Err(ConfigError::GridMismatch {
                voices: initial.voices(),
                steps: initial.steps(),
                expected_voices: config.voices,
                expected_steps: config.steps_per_bar,
            }
            .into());
        }
        Ok(Self {
            config,
            bank,
            pattern: PatternHandle::new(initial),
            loader: SharedLoader::new(loader),
            scheduled: Vec::new(),
            playback: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared grid. Edits through this handle are heard immediately
    /// during live playback.
    pub fn pattern(&self) -> &PatternHandle {
        &self.pattern
    }

    // --- Control ---

    /// Morph to `bpm`. Live, this goes to the running transport; otherwise it
    /// is scheduled at bar 0 of the next offline render, gliding in bar 1.
    pub fn request_transition(
        &mut self,
        bpm: f32,
        transition_id: &str,
        goal_id: &str,
    ) -> Result<(), ControllerError> {
        let bpm = validate_bpm(bpm)?;
        if let Some(pb) = &self.playback {
            let sent = pb.commands.send(Command::Transition {
                bpm,
                transition_id: transition_id.to_string(),
                goal_id: goal_id.to_string(),
            });
            if sent.is_ok() {
                return Ok(());
            }
        }
        self.schedule_transition(0, bpm, transition_id, goal_id)
    }

    /// Queue a morph for an offline render, issued when bar `bar` starts.
    /// The glide occupies bar `bar + 1`.
    pub fn schedule_transition(
        &mut self,
        bar: u64,
        bpm: f32,
        transition_id: &str,
        goal_id: &str,
    ) -> Result<(), ControllerError> {
        let bpm = validate_bpm(bpm)?;
        self.scheduled.push(ScheduledTransition {
            bar,
            bpm,
            transition_id: transition_id.to_string(),
            goal_id: goal_id.to_string(),
        });
        self.scheduled.sort_by_key(|s| s.bar);
        Ok(())
    }

    pub fn scheduled(&self) -> &[ScheduledTransition] {
        &self.scheduled
    }

    /// Change tempo without a morph.
    pub fn set_bpm(&mut self, bpm: f32) -> Result<(), ControllerError> {
        let bpm = validate_bpm(bpm)?;
        self.config.bpm = bpm;
        if let Some(pb) = &self.playback {
            let _ = pb.commands.send(Command::SetBpm(bpm));
        }
        Ok(())
    }

    // --- Real-time playback ---

    /// Open the default audio device and start the transport thread.
    pub fn play(&mut self) -> Result<(), ControllerError> {
        self.stop();

        let (commands, command_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let status = Arc::new(Status::new(self.config.bpm));

        let ctx = LiveContext {
            config: self.config.clone(),
            bank: self.bank.clone(),
            pattern: self.pattern.clone(),
            loader: self.loader.clone(),
            commands: command_rx,
            status: status.clone(),
        };
        let thread = std::thread::Builder::new()
            .name("hb-transport".into())
            .spawn(move || transport_thread(ctx, ready_tx))
            .map_err(|_| ControllerError::TransportExited)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.playback = Some(PlaybackHandle {
                    commands,
                    status,
                    thread: Some(thread),
                });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(ControllerError::TransportExited)
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            let _ = pb.commands.send(Command::Stop);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.status.finished.load(Ordering::Relaxed))
    }

    pub fn position(&self) -> Option<Position> {
        let pb = self.playback.as_ref()?;
        if pb.status.finished.load(Ordering::Relaxed) {
            return None;
        }
        Some(pb.status.position())
    }

    // --- Offline rendering ---

    /// Render `seconds` of audio as interleaved `f32`, running scheduled
    /// transitions. Time comes from the frame count, so step timing is
    /// exact to the frame.
    ///
    /// The grid is left as the last loaded pattern.
    pub fn render_offline(
        &mut self,
        seconds: f64,
        output_rate: u32,
        channels: usize,
    ) -> Result<Vec<f32>, ControllerError> {
        if output_rate == 0 || channels == 0 {
            return Err(ControllerError::Render("rate and channel count must be non-zero"));
        }
        if !(seconds.is_finite() && seconds >= 0.0) {
            return Err(ControllerError::Render("duration must be finite and non-negative"));
        }

        let total_frames = (seconds * output_rate as f64).round() as usize;
        let block = self.config.block_size.max(1);
        let mut out = vec![0.0f32; total_frames * channels];

        let mut mixer = Mixer::new(&self.config, self.bank.clone(), output_rate);
        let mut transport =
            Transport::new(&self.config, self.pattern.clone(), Box::new(self.loader.clone()))?;
        let mut clock = FrameClock::new(output_rate);
        let mut schedule = self.scheduled.iter().peekable();

        transport.start(clock.now(), &mut mixer);
        let mut written = 0;
        while written < total_frames {
            while let Some(req) = schedule.next_if(|s| s.bar <= transport.bar()) {
                transport.request_transition(req.bpm, &req.transition_id, &req.goal_id)?;
            }
            transport.advance(clock.now(), &mut mixer);

            let until_step = clock.frames_until(transport.next_step_time()).max(1);
            let n = block.min(until_step).min(total_frames - written);
            mixer.render(&mut out[written * channels..(written + n) * channels], channels);
            clock.advance(n);
            written += n;
        }

        log::debug!(
            "rendered {total_frames} frames, ended at bar {} ({} bpm)",
            transport.bar(),
            transport.bpm()
        );
        Ok(out)
    }

    /// Render offline as a 16-bit stereo WAV file image.
    pub fn render_to_wav(&mut self, seconds: f64, output_rate: u32) -> Result<Vec<u8>, ControllerError> {
        let samples = self.render_offline(seconds, output_rate, 2)?;
        hb_formats::samples_to_wav(&samples, 2, output_rate)
            .map_err(|e| ControllerError::Format(e.into()))
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LiveContext {
    config: EngineConfig,
    bank: SampleBank,
    pattern: PatternHandle,
    loader: SharedLoader,
    commands: Receiver<Command>,
    status: Arc<Status>,
}

fn transport_thread(ctx: LiveContext, ready: Sender<Result<(), ControllerError>>) {
    let status = ctx.status.clone();
    if let Err(err) = run_live(ctx, &ready) {
        log::error!("live playback failed: {err}");
        let _ = ready.send(Err(err));
    }
    status.finished.store(true, Ordering::Relaxed);
}

fn run_live(
    ctx: LiveContext,
    ready: &Sender<Result<(), ControllerError>>,
) -> Result<(), ControllerError> {
    let mut transport = Transport::new(&ctx.config, ctx.pattern, Box::new(ctx.loader))?;

    let mut output = CpalOutput::new()?;
    let mixer = SharedMixer::new(Mixer::new(&ctx.config, ctx.bank, output.sample_rate()));
    let render_mixer = mixer.clone();
    output.open(Box::new(move |buf, channels| {
        render_mixer.render(buf, channels)
    }))?;
    output.start()?;

    let clock = MonotonicClock::new();
    let mut performer = mixer.clone();
    transport.start(clock.now(), &mut performer);
    let _ = ready.send(Ok(()));

    let tick = Duration::from_millis(ctx.config.tick_interval_ms.max(1));
    loop {
        match ctx.commands.recv_timeout(tick) {
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Command::Transition {
                bpm,
                transition_id,
                goal_id,
            }) => {
                if let Err(err) = transport.request_transition(bpm, &transition_id, &goal_id) {
                    log::warn!("transition rejected: {err}");
                }
            }
            Ok(Command::SetBpm(bpm)) => {
                if let Err(err) = transport.set_bpm(bpm, &mut performer) {
                    log::warn!("tempo change rejected: {err}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Some(report) = transport.advance(clock.now(), &mut performer) {
            ctx.status.publish(&report);
        }
    }

    transport.stop();
    mixer.0.lock().panic();
    output.stop()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_formats::PatternLibrary;
    use hb_ir::Sample;

    const RATE: u32 = 8000;

    fn config() -> EngineConfig {
        EngineConfig {
            voices: 2,
            ..Default::default()
        }
    }

    fn click_bank() -> SampleBank {
        let mut bank = SampleBank::new();
        bank.load_row(0, Sample::from_frames("click", vec![1.0; 40], RATE));
        bank
    }

    fn downbeat() -> Pattern {
        let mut p = Pattern::new(2, 16);
        p.set_step_active(0, 0, true);
        p
    }

    fn controller() -> Controller {
        Controller::new(config(), click_bank(), downbeat(), PatternLibrary::new()).unwrap()
    }

    #[test]
    fn rejects_mismatched_initial_grid() {
        let result = Controller::new(config(), SampleBank::new(), Pattern::new(3, 16), PatternLibrary::new());
        assert!(matches!(result, Err(ControllerError::Config(ConfigError::GridMismatch { .. }))));
    }

    #[test]
    fn offline_render_has_requested_length() {
        let mut c = controller();
        let out = c.render_offline(0.5, RATE, 2).unwrap();
        assert_eq!(out.len(), 4000 * 2);
    }

    #[test]
    fn downbeats_land_on_exact_frames() {
        let mut c = controller();
        let mut config = config();
        config.echo.enabled = false;
        c.config = config;
        // 120 bpm: one bar = 2 s = 16000 frames
        let out = c.render_offline(4.5, RATE, 1).unwrap();
        for bar_frame in [0usize, 16000, 32000] {
            assert!(out[bar_frame] > 0.1, "no click at frame {bar_frame}");
            if bar_frame > 0 {
                assert_eq!(out[bar_frame - 1], 0.0);
            }
        }
    }

    #[test]
    fn invalid_render_requests_are_errors() {
        let mut c = controller();
        assert!(c.render_offline(1.0, 0, 2).is_err());
        assert!(c.render_offline(f64::NAN, RATE, 2).is_err());
    }

    #[test]
    fn invalid_bpm_is_rejected() {
        let mut c = controller();
        assert!(c.set_bpm(-1.0).is_err());
        assert!(c.request_transition(0.0, "a", "b").is_err());
        assert!(c.scheduled().is_empty());
    }

    #[test]
    fn offline_request_is_queued_for_bar_zero() {
        let mut c = controller();
        c.request_transition(90.0, "a", "b").unwrap();
        assert_eq!(c.scheduled()[0].bar, 0);
        assert!(!c.is_playing());
        assert_eq!(c.position(), None);
    }

    #[test]
    fn queued_request_leaves_bar_zero_at_the_old_tempo() {
        let mut c = controller();
        let mut config = config();
        config.echo.enabled = false;
        c.config = config;
        c.request_transition(240.0, "a", "b").unwrap();
        let out = c.render_offline(2.5, RATE, 1).unwrap();
        // bar 0 is a full 120 bpm bar; the glide starts with bar 1
        assert!(out[16000] > 0.1);
        assert!(out[16000 - 40..16000].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn wav_render_has_header() {
        let mut c = controller();
        let wav = c.render_to_wav(0.25, RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 2000 * 2 * 2);
    }
}
