//! # narrate-rs
//!
//! Batch narration on top of voice-cloning text-to-speech engines.
//!
//! ## Features
//!
//! - **Voice samples**: keep per-voice reference clips in a local directory,
//!   mirrored to a backup directory (for example a mounted cloud drive)
//! - **Line stitching**: synthesize a text line by line, optionally borrowing
//!   a few words from neighboring lines for smoother prosody
//! - **Silence marker**: `[silence]` inside a line appends one second of silence
//! - **Archiving**: bundle every line into a zip and a single combined file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use narrate_rs::engines::command::CommandEngine;
//! use narrate_rs::narrator::{text_to_speech, NarrationRequestBuilder};
//! use narrate_rs::{NarrateConfig, Preset, Session};
//!
//! let config = NarrateConfig::default();
//! let engine = CommandEngine::new("tortoise-tts", ["--text", "{text}", "--out", "{output}"]);
//! let mut session = Session::bootstrap(&config, engine, None)?;
//!
//! let request = NarrationRequestBuilder::default()
//!     .text("Hello there.\nHow are you?")
//!     .section("intro")
//!     .voice("marko")
//!     .preset(Preset::Fast)
//!     .build()?;
//!
//! let output = text_to_speech(&mut session, &request)?;
//! println!("Combined audio: {}", output.combined_path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod config;
pub mod engines;
pub mod error;
pub mod gpu;
pub mod narrator;
pub mod session;
pub mod text;
pub mod voices;

pub use config::NarrateConfig;
pub use error::{NarrateError, Result};
pub use session::Session;
pub use voices::{UploadedSample, VoiceSamples};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output sample rate of Tortoise-style engines.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains mono f32 audio samples and the sample rate of the audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Silent audio of the given length in milliseconds.
    pub fn silence(sample_rate: u32, millis: u64) -> Self {
        Self {
            samples: vec![0.0; silence_len(sample_rate, millis)],
            sample_rate,
        }
    }

    /// Append `millis` of silence to the end of the audio.
    pub fn append_silence(&mut self, millis: u64) {
        let len = silence_len(self.sample_rate, millis);
        self.samples.resize(self.samples.len() + len, 0.0);
    }

    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Read a WAV file, downmixing multi-channel audio to mono.
    ///
    /// Integer PCM is scaled into `[-1.0, 1.0]`.
    pub fn read_wav(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn silence_len(sample_rate: u32, millis: u64) -> usize {
    (sample_rate as u64 * millis / 1000) as usize
}

/// Quality/speed trade-off passed to the engine.
///
/// The names match the Tortoise presets and are used verbatim in output
/// file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    UltraFast,
    #[default]
    Fast,
    Standard,
    HighQuality,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::UltraFast => "ultra_fast",
            Preset::Fast => "fast",
            Preset::Standard => "standard",
            Preset::HighQuality => "high_quality",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = NarrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ultra_fast" => Ok(Preset::UltraFast),
            "fast" => Ok(Preset::Fast),
            "standard" => Ok(Preset::Standard),
            "high_quality" => Ok(Preset::HighQuality),
            other => Err(NarrateError::InvalidPreset(other.to_string())),
        }
    }
}

/// Common interface for voice-cloning text-to-speech engines.
///
/// An engine turns text into audio in the voice described by a set of
/// reference samples, at the quality level given by a [`Preset`].
pub trait SynthesisEngine {
    /// Parameters for configuring model loading.
    type ModelParams: Default;

    /// Load a model from the specified path using default parameters.
    fn load_model(&mut self, model_path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
        self.load_model_with_params(model_path, Self::ModelParams::default())
    }

    /// Load a model from the specified path with custom parameters.
    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> std::result::Result<(), Box<dyn std::error::Error>>;

    /// Unload the currently loaded model and free associated resources.
    fn unload_model(&mut self);

    /// Synthesize speech for `text` in the voice of `voice`.
    fn synthesize(
        &mut self,
        text: &str,
        voice: &VoiceSamples,
        preset: Preset,
    ) -> std::result::Result<SynthesisResult, Box<dyn std::error::Error>>;

    /// Synthesize speech from the given text and write to a WAV file.
    ///
    /// Default implementation calls `synthesize()` then `SynthesisResult::write_wav()`.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        voice: &VoiceSamples,
        preset: Preset,
        wav_path: &Path,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        Ok(self.synthesize(text, voice, preset)?.write_wav(wav_path)?)
    }
}
