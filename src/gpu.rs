//! GPU capability report.
//!
//! Informational only: the result never changes how narration runs.

use std::fmt;
use std::process::Command;

/// CUDA cores per streaming multiprocessor, by compute capability.
///
/// Needs extending as new architectures ship; Jetson parts are not covered.
const CORES_PER_SM: &[((u32, u32), u32)] = &[
    ((2, 0), 32),
    ((2, 1), 48),
    ((3, 0), 192),
    ((3, 5), 192),
    ((3, 7), 192),
    ((5, 0), 128),
    ((5, 2), 128),
    ((6, 0), 64),
    ((6, 1), 128),
    ((7, 0), 64),
    ((7, 5), 64),
    ((8, 0), 64),
    ((8, 6), 128),
    ((8, 9), 128),
    ((9, 0), 128),
];

pub fn cores_per_sm(compute_capability: (u32, u32)) -> Option<u32> {
    CORES_PER_SM
        .iter()
        .find(|(cc, _)| *cc == compute_capability)
        .map(|(_, cores)| *cores)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuInfo {
    pub name: String,
    pub compute_capability: (u32, u32),
    /// Streaming multiprocessor count. `nvidia-smi` does not report it, so
    /// it is always `None` for GPUs found by [`probe`]; callers that know the
    /// count (e.g. from the CUDA runtime) can fill it in to get
    /// [`GpuInfo::total_cores`].
    pub multiprocessor_count: Option<u32>,
}

impl GpuInfo {
    pub fn total_cores(&self) -> Option<u32> {
        Some(cores_per_sm(self.compute_capability)? * self.multiprocessor_count?)
    }
}

impl fmt::Display for GpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.compute_capability;
        write!(f, "{}: compute capability {major}.{minor}", self.name)?;
        if let Some(sms) = self.multiprocessor_count {
            write!(f, ", {sms} SMs")?;
        }
        match (self.total_cores(), cores_per_sm(self.compute_capability)) {
            (Some(total), _) => write!(f, ", {total} cores"),
            (None, Some(per_sm)) => write!(f, ", {per_sm} cores per SM"),
            (None, None) => write!(f, ", unknown core layout"),
        }
    }
}

/// Parse one line of
/// `nvidia-smi --query-gpu=name,compute_cap --format=csv,noheader`.
pub fn parse_query_line(line: &str) -> Option<GpuInfo> {
    let (name, cc) = line.rsplit_once(',')?;
    let (major, minor) = cc.trim().split_once('.')?;
    Some(GpuInfo {
        name: name.trim().to_string(),
        compute_capability: (major.parse().ok()?, minor.parse().ok()?),
        multiprocessor_count: None,
    })
}

/// Query the installed GPUs through `nvidia-smi`.
///
/// Returns an empty list when no driver is installed or no GPU is present.
/// The multiprocessor count is left unset, so the report shows cores per SM
/// rather than a total.
pub fn probe() -> Vec<GpuInfo> {
    let output = match Command::new("nvidia-smi")
        .args(["--query-gpu=name,compute_cap", "--format=csv,noheader"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            log::debug!("nvidia-smi exited with code {:?}", output.status.code());
            return Vec::new();
        }
        Err(e) => {
            log::debug!("nvidia-smi not available: {e}");
            return Vec::new();
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(parse_query_line)
        .collect()
}

/// Log the capacity of every GPU, or that none is available.
pub fn check_gpu() -> Vec<GpuInfo> {
    let gpus = probe();
    if gpus.is_empty() {
        log::warn!("GPU not available!");
    }
    for gpu in &gpus {
        log::info!("GPU {gpu}");
    }
    gpus
}
