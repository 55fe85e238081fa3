use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum NarrateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error("Audio encoder failed: {0}")]
    Encoder(String),
    #[error("Voice '{voice}' has no .wav samples in {}", .dir.display())]
    NoVoiceSamples { voice: String, dir: PathBuf },
    #[error("Sample rate mismatch in {}: expected {expected} Hz, found {found} Hz", .path.display())]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("Unknown preset '{0}'. Expected one of: ultra_fast, fast, standard, high_quality")]
    InvalidPreset(String),
}

pub type Result<T> = std::result::Result<T, NarrateError>;
