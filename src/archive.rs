//! Per-line segment files, and the zip and combined artifacts built from
//! them.

use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::EncoderConfig;
use crate::error::{NarrateError, Result};
use crate::SynthesisResult;

/// `generated-<voice>-<index>.wav`
pub fn segment_file_name(voice: &str, index: usize) -> String {
    format!("generated-{voice}-{index}.wav")
}

/// `generated-<voice>-<section>-<preset>`, without extension.
pub fn artifact_stem(voice: &str, section: &str, preset: &str) -> String {
    format!("generated-{voice}-{section}-{preset}")
}

/// Remove `generated-<voice>*.wav` files left in `dir` by an earlier run.
///
/// Returns the files that could not be removed, with the error message.
pub fn remove_generated(dir: &Path, voice: &str) -> Vec<(PathBuf, String)> {
    let prefix = format!("generated-{voice}");
    let mut failures = Vec::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Could not list {}: {e}", dir.display());
            failures.push((dir.to_path_buf(), e.to_string()));
            return failures;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !(name.starts_with(&prefix) && name.ends_with(".wav")) {
            continue;
        }
        let path = entry.path();
        if let Err(e) = fs::remove_file(&path) {
            log::error!("Error while deleting file {}: {e}", path.display());
            failures.push((path, e.to_string()));
        }
    }
    failures
}

/// Bundle `files` into a deflate-compressed zip, stored by file name.
pub fn write_zip(zip_path: &Path, files: &[PathBuf]) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        zip.start_file(name, options)?;
        let mut reader = File::open(file)?;
        std::io::copy(&mut reader, &mut zip)?;
    }

    zip.finish()?;
    log::debug!("Wrote {} files to {}", files.len(), zip_path.display());
    Ok(())
}

/// Decode and concatenate `files`, then append `trailing_silence_ms`.
///
/// All files must share one sample rate. `fallback_rate` is used when
/// `files` is empty.
pub fn concat_segments(
    files: &[PathBuf],
    trailing_silence_ms: u64,
    fallback_rate: u32,
) -> Result<SynthesisResult> {
    let mut files = files.iter();
    let mut combined = match files.next() {
        Some(first) => SynthesisResult::read_wav(first)?,
        None => SynthesisResult {
            samples: Vec::new(),
            sample_rate: fallback_rate,
        },
    };

    for file in files {
        let segment = SynthesisResult::read_wav(file)?;
        if segment.sample_rate != combined.sample_rate {
            return Err(NarrateError::SampleRateMismatch {
                path: file.clone(),
                expected: combined.sample_rate,
                found: segment.sample_rate,
            });
        }
        combined.samples.extend_from_slice(&segment.samples);
    }

    combined.append_silence(trailing_silence_ms);
    Ok(combined)
}

/// Container format of the combined file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinedFormat {
    #[default]
    Mp3,
    Wav,
}

impl CombinedFormat {
    pub fn encoder(self, config: &EncoderConfig, locale: Option<&str>) -> Box<dyn AudioEncoder> {
        match self {
            CombinedFormat::Mp3 => Box::new(LameEncoder::new(config).with_locale(locale)),
            CombinedFormat::Wav => Box::new(WavEncoder),
        }
    }
}

/// Writes audio to a container file.
pub trait AudioEncoder {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    fn encode(&self, audio: &SynthesisResult, path: &Path) -> Result<()>;
}

/// 32-bit float WAV via hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn encode(&self, audio: &SynthesisResult, path: &Path) -> Result<()> {
        audio.write_wav(path)
    }
}

/// MP3 through an external encoder reading 16-bit WAV on stdin.
///
/// Runs `<program> <args..> - <path>`.
#[derive(Debug, Clone)]
pub struct LameEncoder {
    program: String,
    args: Vec<String>,
    locale: Option<String>,
}

impl LameEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            locale: None,
        }
    }

    /// Run the encoder with `LC_ALL` set to `locale`.
    pub fn with_locale(mut self, locale: Option<&str>) -> Self {
        self.locale = locale.map(str::to_string);
        self
    }
}

impl AudioEncoder for LameEncoder {
    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn encode(&self, audio: &SynthesisResult, path: &Path) -> Result<()> {
        let wav = pcm16_wav_bytes(audio)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("-")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(locale) = &self.locale {
            command.env("LC_ALL", locale);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NarrateError::Encoder(format!("{} not found on PATH", self.program))
            } else {
                NarrateError::Io(e)
            }
        })?;

        // stdin is fed from its own thread while stderr drains here
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || -> std::io::Result<()> { stdin.write_all(&wav) })
        });

        let output = child.wait_with_output()?;
        let written = match writer {
            Some(handle) => handle
                .join()
                .map_err(|_| NarrateError::Encoder("stdin writer panicked".to_string()))?,
            None => Ok(()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NarrateError::Encoder(format!(
                "{} exited with code {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }
        written?;
        Ok(())
    }
}

fn pcm16_wav_bytes(audio: &SynthesisResult) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in &audio.samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
