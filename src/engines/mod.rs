//! Speech synthesis engines.
//!
//! This module contains implementations of [`SynthesisEngine`](crate::SynthesisEngine).
//!
//! # Available Engines
//!
//! - [`command::CommandEngine`] - runs an external synthesizer program once
//!   per line and reads back the WAV file it writes

pub mod command;
