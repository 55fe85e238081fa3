//! Runtime configuration.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change:
//!
//! ```json
//! {
//!   "voices_dir": "tortoise/voices",
//!   "backup_mount": "/content/drive/MyDrive",
//!   "engine": {
//!     "program": "python",
//!     "args": ["tortoise/do_tts.py", "--text", "{text}", "--voice", "{voice}",
//!              "--preset", "{preset}", "--output_path", "{output}"]
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NarrateError, Result};

/// Literal marker requesting trailing silence after a line.
pub const SILENCE_MARKER: &str = "[silence]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrateConfig {
    /// Local reference samples live in `<voices_dir>/<voice>/`.
    pub voices_dir: PathBuf,
    /// Per-line segments and final artifacts are written here.
    pub output_dir: PathBuf,
    /// Mount point of the backup drive. Backups are disabled when it is
    /// unset or does not exist.
    pub backup_mount: Option<PathBuf>,
    /// Directory created under `backup_mount` for all backups.
    pub backup_dir_name: String,
    /// Trailing silence for `[silence]` lines and the combined file.
    pub silence_ms: u64,
    /// Words borrowed from neighboring lines when stitching context.
    pub context_words: usize,
    /// Model directory handed to the engine at startup.
    pub model_dir: Option<PathBuf>,
    pub engine: EngineConfig,
    pub encoder: EncoderConfig,
}

impl Default for NarrateConfig {
    fn default() -> Self {
        Self {
            voices_dir: PathBuf::from("voices"),
            output_dir: PathBuf::from("."),
            backup_mount: Some(PathBuf::from("/content/drive/MyDrive")),
            backup_dir_name: "colab_tts_files".to_string(),
            silence_ms: 1000,
            context_words: 3,
            model_dir: None,
            engine: EngineConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }
}

/// External synthesizer invocation.
///
/// `args` may contain the placeholders `{text}`, `{voice}`, `{voice_dir}`,
/// `{preset}`, `{output}` and `{model_dir}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "tortoise_tts".to_string(),
            args: [
                "--text",
                "{text}",
                "--voice",
                "{voice}",
                "--voices-dir",
                "{voice_dir}",
                "--preset",
                "{preset}",
                "--output",
                "{output}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// External MP3 encoder invocation. The encoder reads WAV on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "lame".to_string(),
            args: vec!["--quiet".to_string(), "-V2".to_string()],
        }
    }
}

impl NarrateConfig {
    /// Load a JSON config file. Missing keys take their default values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backup_dir_name.is_empty() {
            return Err(NarrateError::Config(
                "backup_dir_name must not be empty".to_string(),
            ));
        }
        if self.engine.program.is_empty() {
            return Err(NarrateError::Config(
                "engine.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrate.json");
        std::fs::write(&path, r#"{ "voices_dir": "tortoise/voices", "context_words": 2 }"#).unwrap();

        let config = NarrateConfig::load(&path).unwrap();
        assert_eq!(config.voices_dir, PathBuf::from("tortoise/voices"));
        assert_eq!(config.context_words, 2);
        assert_eq!(config.silence_ms, 1000);
        assert_eq!(config.backup_dir_name, "colab_tts_files");
        assert_eq!(config.encoder, EncoderConfig::default());
    }

    #[test]
    fn null_backup_mount_disables_backups() {
        let config: NarrateConfig = serde_json::from_str(r#"{ "backup_mount": null }"#).unwrap();
        assert_eq!(config.backup_mount, None);
    }

    #[test]
    fn rejects_empty_engine_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrate.json");
        std::fs::write(&path, r#"{ "engine": { "program": "" } }"#).unwrap();
        assert!(matches!(
            NarrateConfig::load(&path),
            Err(NarrateError::Config(_))
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrate.json");
        std::fs::write(&path, "{ voices_dir").unwrap();
        assert!(matches!(NarrateConfig::load(&path), Err(NarrateError::Json(_))));
    }
}
