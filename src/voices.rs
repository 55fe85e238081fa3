//! Voice reference samples.
//!
//! Each voice keeps its samples in `<voices_dir>/<voice>/*.wav`. When a
//! backup store is available the samples are mirrored to
//! `<backup_root>/<voice>/voices/`, and whichever side has content is
//! copied to the empty side.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NarrateError, Result};
use crate::session::{copy_into_dir, BackupStore};

/// Extension of reference sample files.
pub const SAMPLE_EXTENSION: &str = "wav";

/// A named byte buffer supplied by an upload source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedSample {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedSample {
    /// Read a sample from disk, named after its file name.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            bytes: fs::read(path)?,
        })
    }
}

/// The reference samples an engine conditions on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSamples {
    pub voice: String,
    pub dir: PathBuf,
    /// Sample files, sorted by path.
    pub files: Vec<PathBuf>,
}

/// Which way reconciliation copied files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    LocalToBackup,
    BackupToLocal,
    Unchanged,
}

/// What [`ensure_voice`] did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceReport {
    pub reconciliation: Option<Reconciliation>,
    pub removed: Vec<PathBuf>,
    /// Files that could not be removed or copied, with the error message.
    pub failures: Vec<(PathBuf, String)>,
    pub stored: Vec<PathBuf>,
}

/// Sorted names of all voice directories under `voices_dir`.
pub fn list_voices(voices_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(voices_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Load the reference samples of `voice`.
pub fn load_voice(voices_dir: &Path, voice: &str) -> Result<VoiceSamples> {
    let dir = voices_dir.join(voice);
    let files = if dir.is_dir() {
        files_with_extension(&dir, SAMPLE_EXTENSION)?
    } else {
        Vec::new()
    };
    if files.is_empty() {
        return Err(NarrateError::NoVoiceSamples {
            voice: voice.to_string(),
            dir,
        });
    }
    log::debug!("Voice '{voice}': {} samples", files.len());
    Ok(VoiceSamples {
        voice: voice.to_string(),
        dir,
        files,
    })
}

/// Make sure `<voices_dir>/<voice>` exists and is filled.
///
/// No engine is involved, so this runs without a loaded model.
///
/// Without `reload`, the local and backup directories are reconciled first.
/// With `reload`, or when the local directory is still empty afterwards,
/// existing samples are removed and `uploads` are stored as `0.wav`,
/// `1.wav`, ... in upload order.
///
/// Only a failure to create the local directory is returned as an error.
/// Everything else is logged and recorded in the report.
pub fn ensure_voice(
    voices_dir: &Path,
    backup: Option<&BackupStore>,
    voice: &str,
    reload: bool,
    uploads: &[UploadedSample],
) -> Result<VoiceReport> {
    let local = voices_dir.join(voice);
    fs::create_dir_all(&local)?;

    let mut report = VoiceReport::default();

    let backup_dir = match backup {
        Some(store) => {
            let dir = store.voice_samples_dir(voice);
            match fs::create_dir_all(&dir) {
                Ok(()) => Some(dir),
                Err(e) => {
                    log::error!("Could not create backup directory {}: {e}", dir.display());
                    report.failures.push((dir, e.to_string()));
                    None
                }
            }
        }
        None => {
            log::info!(
                "Backup not available. Working with local voices only: {:?}",
                file_names(&local)
            );
            None
        }
    };

    if let Some(backup) = &backup_dir {
        log::info!(
            "Backup voices: {:?}, local voices: {:?}",
            file_names(backup),
            file_names(&local)
        );
        if !reload {
            report.reconciliation = Some(reconcile(&local, backup, &mut report.failures));
        }
    }

    if reload || is_empty_dir(&local) {
        if !is_empty_dir(&local) {
            log::info!("Removing old voice files...");
            remove_old_files(&local, SAMPLE_EXTENSION, &mut report);
            if let Some(backup) = &backup_dir {
                remove_old_files(backup, SAMPLE_EXTENSION, &mut report);
            }
        }
        store_uploads(&local, backup_dir.as_deref(), uploads, &mut report);
    }

    Ok(report)
}

/// Copy files from the side with content to the empty side.
///
/// When both sides have content, or both are empty, nothing is copied.
pub fn reconcile(
    local: &Path,
    backup: &Path,
    failures: &mut Vec<(PathBuf, String)>,
) -> Reconciliation {
    let (from, to, direction) = match (is_empty_dir(local), is_empty_dir(backup)) {
        (false, true) => (local, backup, Reconciliation::LocalToBackup),
        (true, false) => (backup, local, Reconciliation::BackupToLocal),
        _ => return Reconciliation::Unchanged,
    };

    log::info!("Copying files from {} to {}", from.display(), to.display());
    let entries = match fs::read_dir(from) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Could not read {}: {e}", from.display());
            failures.push((from.to_path_buf(), e.to_string()));
            return direction;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Err(e) = copy_into_dir(&path, to) {
            log::error!("Could not copy {}: {e}", path.display());
            failures.push((path, e.to_string()));
        }
    }
    direction
}

/// Remove every file with `extension` from `dir`, recording failures.
fn remove_old_files(dir: &Path, extension: &str, report: &mut VoiceReport) {
    let files = match files_with_extension(dir, extension) {
        Ok(files) => files,
        Err(e) => {
            log::error!("Could not list {}: {e}", dir.display());
            report.failures.push((dir.to_path_buf(), e.to_string()));
            return;
        }
    };
    for file in files {
        match fs::remove_file(&file) {
            Ok(()) => report.removed.push(file),
            Err(e) => {
                log::error!("Error while deleting file {}: {e}", file.display());
                report.failures.push((file, e.to_string()));
            }
        }
    }
}

fn store_uploads(
    local: &Path,
    backup: Option<&Path>,
    uploads: &[UploadedSample],
    report: &mut VoiceReport,
) {
    if uploads.is_empty() {
        log::warn!(
            "No samples uploaded for {}. Upload at least two 6-10 second WAV clips",
            local.display()
        );
        return;
    }

    for (i, upload) in uploads.iter().enumerate() {
        let path = local.join(format!("{i}.{SAMPLE_EXTENSION}"));
        if let Err(e) = fs::write(&path, &upload.bytes) {
            log::error!("Could not store {} as {}: {e}", upload.name, path.display());
            report.failures.push((path, e.to_string()));
            continue;
        }
        log::info!("Stored {} as {}", upload.name, path.display());
        if let Some(backup) = backup {
            if let Err(e) = copy_into_dir(&path, backup) {
                log::error!("Could not back up {}: {e}", path.display());
                report.failures.push((path.clone(), e.to_string()));
            }
        }
        report.stored.push(path);
    }
}

/// Files in `dir` whose extension is `extension`, sorted by path.
pub(crate) fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort_unstable();
    names
}
