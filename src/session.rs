//! Environment bootstrap and the per-run session context.
//!
//! A [`Session`] is created once at startup and passed to every operation.
//! It records whether the backup drive is usable, the locale override for
//! child processes, and owns the synthesis engine.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::NarrateConfig;
use crate::error::{NarrateError, Result};
use crate::SynthesisEngine;

/// Locale handed to child processes when the host locale is not UTF-8.
pub const UTF8_LOCALE: &str = "C.UTF-8";

/// Backup tree rooted at `<backup_mount>/<backup_dir_name>`.
///
/// ```text
/// <root>/
/// └── <voice>/
///     ├── generated-<voice>-0.wav   # per-line segments and archives
///     └── voices/                   # reference samples
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    /// Use an existing mount point. Returns `None` when the mount is not
    /// available or the backup root cannot be created.
    pub fn mount(mount: &Path, dir_name: &str) -> Option<Self> {
        if !mount.is_dir() {
            log::warn!(
                "Could not mount backup drive at {}: not a directory",
                mount.display()
            );
            return None;
        }
        let root = mount.join(dir_name);
        if let Err(e) = fs::create_dir_all(&root) {
            log::warn!("Could not create backup root {}: {e}", root.display());
            return None;
        }
        Some(Self { root })
    }

    /// The store configured by `backup_mount`, if it is usable.
    ///
    /// Logs which mode the run works in.
    pub fn from_config(config: &NarrateConfig) -> Option<Self> {
        let backup = match &config.backup_mount {
            Some(mount) => Self::mount(mount, &config.backup_dir_name),
            None => None,
        };
        match &backup {
            Some(store) => log::info!("Backing up to {}", store.root().display()),
            None => log::warn!("Backup drive not available. Working with local files only"),
        }
        backup
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding generated files for `voice`.
    pub fn voice_dir(&self, voice: &str) -> PathBuf {
        self.root.join(voice)
    }

    /// Directory holding reference samples for `voice`.
    pub fn voice_samples_dir(&self, voice: &str) -> PathBuf {
        self.voice_dir(voice).join("voices")
    }

    /// Copy `file` into the generated-files directory of `voice`.
    pub fn back_up(&self, file: &Path, voice: &str) -> Result<PathBuf> {
        copy_into_dir(file, &self.voice_dir(voice))
    }
}

/// Copy `file` into `dir`, keeping its file name.
pub fn copy_into_dir(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| {
        NarrateError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", file.display()),
        ))
    })?;
    let target = dir.join(name);
    fs::copy(file, &target)?;
    Ok(target)
}

/// Decide the child-process locale from the effective host locale value.
pub fn locale_override_for(host_locale: Option<&str>) -> Option<String> {
    match host_locale {
        Some(value) if is_utf8_locale(value) => None,
        _ => Some(UTF8_LOCALE.to_string()),
    }
}

fn is_utf8_locale(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.contains("utf-8") || lower.contains("utf8")
}

/// Locale override for child processes, derived from `LC_ALL`, `LC_CTYPE`
/// and `LANG` in that order of precedence.
pub fn utf8_locale_override() -> Option<String> {
    let host = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty());

    let locale = locale_override_for(host.as_deref());
    match (&host, &locale) {
        (Some(host), Some(locale)) => log::info!("Host locale {host} -> {locale} for child processes"),
        (None, Some(locale)) => log::info!("No host locale set, using {locale} for child processes"),
        (Some(host), None) => log::debug!("Host locale {host}"),
        (None, None) => {}
    }
    locale
}

pub struct Session<E: SynthesisEngine> {
    config: NarrateConfig,
    backup: Option<BackupStore>,
    locale_override: Option<String>,
    engine: E,
}

impl<E: SynthesisEngine> Session<E> {
    /// Detect the backup drive and load the engine model.
    ///
    /// `locale_override` is the value from [`utf8_locale_override`], computed
    /// once by the caller and also handed to the engine.
    ///
    /// An unavailable backup drive is not an error: the session falls back
    /// to local-only mode for its whole lifetime.
    pub fn bootstrap(
        config: &NarrateConfig,
        mut engine: E,
        locale_override: Option<String>,
    ) -> Result<Self> {
        config.validate()?;

        let backup = BackupStore::from_config(config);

        if let Some(model_dir) = &config.model_dir {
            engine
                .load_model(model_dir)
                .map_err(|e| NarrateError::Synthesis(format!("Failed to load model: {e}")))?;
            log::info!("Loaded model from {}", model_dir.display());
        }

        Ok(Self {
            config: config.clone(),
            backup,
            locale_override,
            engine,
        })
    }

    /// A session with an explicit backup store, skipping mount detection.
    pub fn with_backup(config: &NarrateConfig, engine: E, backup: Option<BackupStore>) -> Self {
        Self {
            config: config.clone(),
            backup,
            locale_override: None,
            engine,
        }
    }

    pub fn config(&self) -> &NarrateConfig {
        &self.config
    }

    pub fn backup(&self) -> Option<&BackupStore> {
        self.backup.as_ref()
    }

    pub fn backup_enabled(&self) -> bool {
        self.backup.is_some()
    }

    pub fn locale_override(&self) -> Option<&str> {
        self.locale_override.as_deref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

}

impl<E: SynthesisEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.engine.unload_model();
    }
}
