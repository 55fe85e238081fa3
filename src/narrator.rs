//! Line-by-line narration of a text into per-line segments, a zip of those
//! segments and one combined audio file.

use std::fs;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::archive::{
    artifact_stem, concat_segments, remove_generated, segment_file_name, write_zip,
    CombinedFormat,
};
use crate::error::{NarrateError, Result};
use crate::session::Session;
use crate::text::{plan_lines, PlannedLine, StitchOptions};
use crate::voices::{load_voice, VoiceSamples};
use crate::{Preset, SynthesisEngine, SynthesisResult, DEFAULT_SAMPLE_RATE};

/// Which generated segments go into the zip and the combined file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveBound {
    /// Segments whose index is below the index the final text line took, or
    /// would have taken. When the final line is generated successfully its
    /// own segment is left out.
    #[default]
    LastProcessedExclusive,
    /// Every generated segment.
    AllGenerated,
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct NarrationRequest {
    /// Text to narrate, one utterance per line.
    pub text: String,
    /// Label for the zip and combined file.
    pub section: String,
    pub voice: String,
    #[builder(default)]
    pub preset: Preset,
    /// Append the first words of the next line to each line.
    #[builder(default)]
    pub append_next: bool,
    /// Prepend the last words of the previous line to each line.
    #[builder(default)]
    pub append_prev: bool,
    #[builder(default)]
    pub archive_bound: ArchiveBound,
    #[builder(default)]
    pub format: CombinedFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineStatus {
    Generated { index: usize, path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineOutcome {
    pub original_index: usize,
    /// Text sent to the engine.
    pub text: String,
    pub status: LineStatus,
}

#[derive(Debug, Clone)]
pub struct NarrationOutput {
    pub lines: Vec<LineOutcome>,
    /// All segment files written in this run, by index.
    pub segments: Vec<PathBuf>,
    /// Segments included in the zip and the combined file.
    pub archived: Vec<PathBuf>,
    pub zip_path: PathBuf,
    pub combined_path: PathBuf,
    pub combined: SynthesisResult,
}

impl NarrationOutput {
    pub fn failed_lines(&self) -> impl Iterator<Item = &LineOutcome> {
        self.lines
            .iter()
            .filter(|l| matches!(l.status, LineStatus::Failed { .. }))
    }
}

/// Narrate `request.text` line by line.
///
/// Segments from an earlier run for the same voice are removed first. A
/// line that fails to synthesize is logged and skipped without retry; the
/// next line takes over its index. Failing to load the voice or to build
/// the final artifacts is an error.
pub fn text_to_speech<E: SynthesisEngine>(
    session: &mut Session<E>,
    request: &NarrationRequest,
) -> Result<NarrationOutput> {
    let config = session.config().clone();
    let voice = request.voice.as_str();

    fs::create_dir_all(&config.output_dir)?;
    for (path, e) in remove_generated(&config.output_dir, voice) {
        log::warn!("Left stale segment {}: {e}", path.display());
    }
    if let Some(store) = session.backup() {
        let backup_dir = store.voice_dir(voice);
        match fs::create_dir_all(&backup_dir) {
            Ok(()) => {
                for (path, e) in remove_generated(&backup_dir, voice) {
                    log::warn!("Left stale backup segment {}: {e}", path.display());
                }
            }
            Err(e) => log::error!("Could not create {}: {e}", backup_dir.display()),
        }
    }

    let samples = load_voice(&config.voices_dir, voice)?;

    let options = StitchOptions {
        append_prev: request.append_prev,
        append_next: request.append_next,
        context_words: config.context_words,
    };
    let planned = plan_lines(&request.text, &options);
    let last_line = request.text.split('\n').count() - 1;

    let mut lines = Vec::with_capacity(planned.len());
    let mut segments = Vec::new();
    let mut before_last_line = 0;

    for line in planned {
        let index = segments.len();
        log::info!("SENTENCE #{index}: {}", line.text);

        let status = match render_line(session, &samples, request, &line, index) {
            Ok(path) => {
                segments.push(path.clone());
                if line.original_index < last_line {
                    before_last_line = segments.len();
                }
                LineStatus::Generated { index, path }
            }
            Err(e) => {
                log::error!("Skipping line {}: {e}", line.original_index);
                LineStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        lines.push(LineOutcome {
            original_index: line.original_index,
            text: line.text,
            status,
        });
    }

    let bound = match request.archive_bound {
        ArchiveBound::LastProcessedExclusive => before_last_line,
        ArchiveBound::AllGenerated => segments.len(),
    };
    if bound < segments.len() {
        log::warn!(
            "Archiving {bound} of {} segments; {} left out",
            segments.len(),
            segments[bound].display()
        );
    }
    let archived = segments[..bound].to_vec();

    let stem = artifact_stem(voice, &request.section, request.preset.as_str());

    let zip_path = config.output_dir.join(format!("{stem}.zip"));
    write_zip(&zip_path, &archived)?;
    back_up(session, &zip_path, voice);

    let combined = concat_segments(&archived, config.silence_ms, DEFAULT_SAMPLE_RATE)?;
    let encoder = request
        .format
        .encoder(&config.encoder, session.locale_override());
    let combined_path = config
        .output_dir
        .join(format!("{stem}.{}", encoder.extension()));
    encoder.encode(&combined, &combined_path)?;
    back_up(session, &combined_path, voice);

    log::info!(
        "Wrote {} ({:.1}s) and {}",
        combined_path.display(),
        combined.duration_secs(),
        zip_path.display()
    );

    Ok(NarrationOutput {
        lines,
        segments,
        archived,
        zip_path,
        combined_path,
        combined,
    })
}

/// Synthesize one line and write it as segment `index`.
fn render_line<E: SynthesisEngine>(
    session: &mut Session<E>,
    samples: &VoiceSamples,
    request: &NarrationRequest,
    line: &PlannedLine,
    index: usize,
) -> Result<PathBuf> {
    let mut audio = session
        .engine_mut()
        .synthesize(&line.text, samples, request.preset)
        .map_err(|e| NarrateError::Synthesis(e.to_string()))?;

    if line.add_silence {
        audio.append_silence(session.config().silence_ms);
    }

    let path = session
        .config()
        .output_dir
        .join(segment_file_name(&request.voice, index));
    audio.write_wav(&path)?;

    if let Some(store) = session.backup() {
        store.back_up(&path, &request.voice)?;
    }
    Ok(path)
}

fn back_up<E: SynthesisEngine>(session: &Session<E>, file: &Path, voice: &str) {
    if let Some(store) = session.backup() {
        if let Err(e) = store.back_up(file, voice) {
            log::error!("Could not back up {}: {e}", file.display());
        }
    }
}
