//! External-program synthesis engine.
//!
//! The heavy lifting (model inference on the GPU) stays in whatever program
//! the user points this engine at, typically a Tortoise wrapper script. For
//! every line the engine fills in an argument template, runs the program,
//! and reads the WAV file it wrote.
//!
//! # Placeholders
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{text}` | Text of the line |
//! | `{voice}` | Voice name |
//! | `{voice_dir}` | Parent directory of the voice's sample directory |
//! | `{preset}` | Preset name, e.g. `fast` |
//! | `{output}` | WAV path the program must write |
//! | `{model_dir}` | Model directory given to `load_model`, or empty |
//!
//! # Example
//!
//! ```rust,no_run
//! use narrate_rs::engines::command::CommandEngine;
//! use narrate_rs::voices::load_voice;
//! use narrate_rs::{Preset, SynthesisEngine};
//! use std::path::Path;
//!
//! let mut engine = CommandEngine::new(
//!     "python",
//!     ["do_tts.py", "--text", "{text}", "--voice", "{voice}", "--output", "{output}"],
//! );
//! let voice = load_voice(Path::new("voices"), "marko")?;
//! let result = engine.synthesize("Hello, world!", &voice, Preset::Fast)?;
//! println!("{:.2}s of audio", result.duration_secs());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::EngineConfig;
use crate::voices::VoiceSamples;
use crate::{Preset, SynthesisEngine, SynthesisResult};

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not read synthesizer output: {0}")]
    Wav(#[from] hound::Error),
    #[error("Synthesizer program '{0}' not found on PATH")]
    ProgramNotFound(String),
    #[error("Synthesizer exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("Synthesizer did not write {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("Model directory {} does not exist", .0.display())]
    ModelDirNotFound(PathBuf),
}

/// Parameters for configuring model loading.
#[derive(Debug, Clone, Default)]
pub struct CommandModelParams {
    /// Directory for the temporary WAV files. `None` uses the system
    /// temporary directory.
    pub scratch_dir: Option<PathBuf>,
}

pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    model_dir: Option<PathBuf>,
    scratch_dir: PathBuf,
    locale: Option<String>,
}

impl CommandEngine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            model_dir: None,
            scratch_dir: std::env::temp_dir(),
            locale: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.program.clone(), config.args.iter().cloned())
    }

    /// Run the program with `LC_ALL` set to `locale`.
    pub fn with_locale(mut self, locale: Option<&str>) -> Self {
        self.locale = locale.map(str::to_string);
        self
    }

    /// Fill in the argument template for one invocation.
    pub fn render_args(
        &self,
        text: &str,
        voice: &VoiceSamples,
        preset: Preset,
        output: &Path,
    ) -> Vec<String> {
        let voice_dir = voice
            .dir
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let model_dir = self
            .model_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        self.args
            .iter()
            .map(|arg| {
                // text goes last so its content is never treated as a placeholder
                arg.replace("{voice_dir}", &voice_dir)
                    .replace("{voice}", &voice.voice)
                    .replace("{preset}", preset.as_str())
                    .replace("{output}", &output.display().to_string())
                    .replace("{model_dir}", &model_dir)
                    .replace("{text}", text)
            })
            .collect()
    }

    fn run(&self, args: &[String]) -> Result<(), CommandError> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(locale) = &self.locale {
            command.env("LC_ALL", locale);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::ProgramNotFound(self.program.clone())
            } else {
                CommandError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl SynthesisEngine for CommandEngine {
    type ModelParams = CommandModelParams;

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !model_path.is_dir() {
            return Err(CommandError::ModelDirNotFound(model_path.to_path_buf()).into());
        }
        self.model_dir = Some(model_path.to_path_buf());
        if let Some(dir) = params.scratch_dir {
            std::fs::create_dir_all(&dir)?;
            self.scratch_dir = dir;
        }
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model_dir = None;
    }

    fn synthesize(
        &mut self,
        text: &str,
        voice: &VoiceSamples,
        preset: Preset,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>> {
        // removed with everything in it when dropped, whichever way we return
        let scratch = tempfile::Builder::new()
            .prefix("narrate-")
            .tempdir_in(&self.scratch_dir)
            .map_err(CommandError::Io)?;
        let output = scratch.path().join("line.wav");
        let args = self.render_args(text, voice, preset, &output);
        log::debug!("Running {} {:?}", self.program, args);

        self.run(&args)?;
        if !output.exists() {
            return Err(CommandError::MissingOutput(output).into());
        }

        let result = SynthesisResult::read_wav(&output)?;
        if let Err(e) = scratch.close() {
            log::warn!("Could not remove scratch directory: {e}");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(dir: &Path) -> VoiceSamples {
        VoiceSamples {
            voice: "marko".to_string(),
            dir: dir.join("voices/marko"),
            files: vec![dir.join("voices/marko/0.wav")],
        }
    }

    #[test]
    fn renders_every_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = CommandEngine::new(
            "tts",
            ["{text}", "--voice={voice}", "{voice_dir}", "{preset}", "{output}", "{model_dir}"],
        );
        engine.load_model(dir.path()).unwrap();

        let args = engine.render_args("Hi {preset}", &voice(dir.path()), Preset::HighQuality, Path::new("/tmp/o.wav"));
        assert_eq!(
            args,
            vec![
                "Hi {preset}".to_string(),
                "--voice=marko".to_string(),
                dir.path().join("voices").display().to_string(),
                "high_quality".to_string(),
                "/tmp/o.wav".to_string(),
                dir.path().display().to_string(),
            ]
        );
    }

    #[test]
    fn reads_back_the_written_wav() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("fixture.wav");
        SynthesisResult {
            samples: vec![0.25; 48],
            sample_rate: 24000,
        }
        .write_wav(&fixture)
        .unwrap();

        let mut engine = CommandEngine::new("cp", [fixture.display().to_string(), "{output}".to_string()]);
        let result = engine
            .synthesize("ignored", &voice(dir.path()), Preset::Fast)
            .unwrap();
        assert_eq!(result.sample_rate, 24000);
        assert_eq!(result.samples.len(), 48);
    }

    #[test]
    fn failing_program_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = CommandEngine::new("false", Vec::<String>::new());
        assert!(engine
            .synthesize("text", &voice(dir.path()), Preset::Fast)
            .is_err());
    }

    #[test]
    fn missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = CommandEngine::new("narrate-no-such-synthesizer", Vec::<String>::new());
        let err = engine
            .synthesize("text", &voice(dir.path()), Preset::Fast)
            .unwrap_err();
        assert!(err.to_string().contains("not found on PATH"));
    }

    #[test]
    fn failed_runs_leave_no_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let mut engine = CommandEngine::new(
            "sh",
            ["-c", "echo partial > \"$0\"; exit 1", "{output}"],
        );
        engine
            .load_model_with_params(
                dir.path(),
                CommandModelParams {
                    scratch_dir: Some(scratch.clone()),
                },
            )
            .unwrap();

        for _ in 0..2 {
            let err = engine
                .synthesize("text", &voice(dir.path()), Preset::Fast)
                .unwrap_err();
            assert!(err.to_string().contains("exited with code Some(1)"));
        }
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn unreadable_output_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let mut engine = CommandEngine::new("sh", ["-c", "echo not-a-wav > \"$0\"", "{output}"]);
        engine
            .load_model_with_params(
                dir.path(),
                CommandModelParams {
                    scratch_dir: Some(scratch.clone()),
                },
            )
            .unwrap();

        assert!(engine
            .synthesize("text", &voice(dir.path()), Preset::Fast)
            .is_err());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn missing_model_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = CommandEngine::new("tts", Vec::<String>::new());
        assert!(engine.load_model(&dir.path().join("nope")).is_err());
    }
}
