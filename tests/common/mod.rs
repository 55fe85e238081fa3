#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use narrate_rs::session::BackupStore;
use narrate_rs::voices::VoiceSamples;
use narrate_rs::{NarrateConfig, Preset, Session, SynthesisEngine, SynthesisResult};

pub const RATE: u32 = 1000;
pub const CLIP_LEN: usize = 50;

/// Records every text it is asked to speak and fails on texts containing
/// one of `fail_on`.
#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: Vec<String>,
    pub fail_on: Vec<String>,
}

impl ScriptedEngine {
    pub fn failing_on(patterns: &[&str]) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl SynthesisEngine for ScriptedEngine {
    type ModelParams = ();

    fn load_model_with_params(
        &mut self,
        _model_path: &Path,
        _params: (),
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn unload_model(&mut self) {}

    fn synthesize(
        &mut self,
        text: &str,
        _voice: &VoiceSamples,
        _preset: Preset,
    ) -> Result<SynthesisResult, Box<dyn std::error::Error>> {
        self.calls.push(text.to_string());
        if self.fail_on.iter().any(|p| text.contains(p.as_str())) {
            return Err(format!("cannot speak {text:?}").into());
        }
        Ok(SynthesisResult {
            samples: vec![0.5; CLIP_LEN],
            sample_rate: RATE,
        })
    }
}

/// Config rooted in `root`, backups disabled, with one sample for `voice`.
pub fn config_with_voice(root: &Path, voice: &str) -> NarrateConfig {
    let config = NarrateConfig {
        voices_dir: root.join("voices"),
        output_dir: root.join("out"),
        backup_mount: None,
        ..NarrateConfig::default()
    };
    let voice_dir = config.voices_dir.join(voice);
    fs::create_dir_all(&voice_dir).unwrap();
    write_clip(&voice_dir.join("0.wav"), 10);
    config
}

pub fn session(
    config: &NarrateConfig,
    engine: ScriptedEngine,
    backup: Option<BackupStore>,
) -> Session<ScriptedEngine> {
    Session::with_backup(config, engine, backup)
}

pub fn write_clip(path: &Path, len: usize) {
    SynthesisResult {
        samples: vec![0.1; len],
        sample_rate: RATE,
    }
    .write_wav(path)
    .unwrap();
}

/// Sorted file names in `dir`.
pub fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn path_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
