//! Core data model for the heartbeat step sequencer.
//!
//! Defines the step grid, sample data and timing primitives shared by the
//! playback engine, the pattern store and the controller.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod pattern;
mod sample;
mod tempo;
mod timestamp;

pub use pattern::{pitch_to_multiplier, Pattern, Step, DEFAULT_PITCH};
pub use sample::{Sample, SampleBank, SampleKey};
pub use tempo::{lerp, step_duration};
pub use timestamp::Timestamp;
