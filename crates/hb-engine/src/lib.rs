//! Playback engine for the heartbeat step sequencer.
//!
//! Two entry points drive everything: [`Transport::advance`] steps the beat
//! grid against a monotonic clock, and [`Mixer::render`] fills an interleaved
//! output buffer from the voice pool. The transport talks to the mixer only
//! through the [`Performer`] trait, so the embedding decides how the two are
//! synchronized.

mod config;
mod echo;
mod interfaces;
mod limiter;
mod mixer;
mod morph;
mod pattern_slot;
mod transport;
mod voice;
mod voice_pool;

pub use config::{validate_bpm, ConfigError, EchoConfig, EngineConfig};
pub use echo::Echo;
pub use interfaces::{LoadError, PatternLoader, Performer, TimeSource};
pub use limiter::{apply_soft_limit, soft_clip};
pub use mixer::Mixer;
pub use morph::{Morph, MorphPhase, MorphRequest};
pub use pattern_slot::PatternHandle;
pub use transport::{StepReport, Transport};
pub use voice::{MixParams, Voice};
pub use voice_pool::{TriggerOutcome, VoiceId, VoicePool};
