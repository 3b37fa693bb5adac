//! Threshold Persistence
//!
//! A calibrated [`ThresholdSet`] has no operational value until it is durably
//! stored, and a half-written set is worse than none. Every writer here goes
//! through a temp file (or staging directory) followed by a rename.
//!
//! - `JsonFileSink`: `<dir>/thresholds.json`
//! - `ModelRegistry`: versioned artifact directories with a `latest` pointer
//! - `RegistrySink`: one registry version as a `ThresholdSink`
//! - `RegistryLock`: keeps two calibration processes out of one registry

pub mod lockfile;
pub mod registry;

pub use lockfile::RegistryLock;
pub use registry::{ModelRegistry, RegistryArtifacts, RegistryMeta, RegistrySink};

use crate::types::ThresholdSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// File name of the persisted threshold document.
pub const THRESHOLDS_FILE_NAME: &str = "thresholds.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Registry at {path} is locked by another calibration process (PID: {pid})")]
    Locked { path: PathBuf, pid: u32 },

    #[error("Invalid version tag '{0}': must be a plain directory name")]
    InvalidVersionTag(String),

    #[error("Version {0} not found in registry")]
    VersionNotFound(String),
}

impl StorageError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |e| StorageError::Io(path.to_path_buf(), e)
    }
}

/// Durable destination for a complete threshold set.
pub trait ThresholdSink {
    /// Store the set, returning where it landed.
    fn persist(&self, set: &ThresholdSet) -> Result<PathBuf, StorageError>;
}

/// Write `bytes` to `path` atomically (write temp file alongside, then rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StorageError::io(parent))?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, bytes).map_err(StorageError::io(&tmp_path))?;
    std::fs::rename(&tmp_path, path).map_err(StorageError::io(path))?;
    Ok(())
}

/// Pretty-printed `thresholds.json` in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(THRESHOLDS_FILE_NAME)
    }

    /// Read a previously persisted set back.
    pub fn load(&self) -> Result<ThresholdSet, StorageError> {
        load_thresholds(&self.path())
    }
}

impl ThresholdSink for JsonFileSink {
    fn persist(&self, set: &ThresholdSet) -> Result<PathBuf, StorageError> {
        let path = self.path();
        let json = set.to_json_pretty()?;
        write_atomic(&path, json.as_bytes())?;
        info!(path = %path.display(), axes = set.len(), "Threshold set saved");
        Ok(path)
    }
}

/// Parse a `thresholds.json` document.
pub fn load_thresholds(path: &Path) -> Result<ThresholdSet, StorageError> {
    let json = std::fs::read_to_string(path).map_err(StorageError::io(path))?;
    Ok(serde_json::from_str(&json)?)
}
