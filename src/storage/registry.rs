//! Versioned Artifact Registry
//!
//! Layout under the registry root:
//!
//! ```text
//! registry/
//! ├── v1/
//! │   ├── thresholds.json
//! │   ├── metrics.csv
//! │   └── meta.json
//! ├── v2/ ...
//! └── latest -> v2
//! ```
//!
//! A version is assembled in a hidden staging directory and renamed into
//! place, so readers never see a partially written version. Saving an
//! existing tag replaces it: the old directory is parked as `.old-<tag>`
//! until the new one is in place, and restored if the swap fails.

use super::lockfile::RegistryLock;
use super::{load_thresholds, write_atomic, StorageError, ThresholdSink, THRESHOLDS_FILE_NAME};
use crate::config::ThresholdPolicy;
use crate::metrics::{self, AxisMetrics};
use crate::types::ThresholdSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const METRICS_FILE_NAME: &str = "metrics.csv";
pub const META_FILE_NAME: &str = "meta.json";
pub const LATEST_POINTER: &str = "latest";

/// Provenance recorded next to every saved version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryMeta {
    pub run_name: String,
    pub axes: Vec<String>,
    pub dt_seconds: f64,
    pub policy: ThresholdPolicy,
    /// Residual file the set was calibrated from, when known.
    #[serde(default)]
    pub source: Option<String>,
    /// Filled in at save time when absent.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Everything stored for one version.
#[derive(Debug, Clone, Copy)]
pub struct RegistryArtifacts<'a> {
    pub thresholds: &'a ThresholdSet,
    pub metrics: &'a [AxisMetrics],
    pub meta: &'a RegistryMeta,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, version_tag: &str) -> PathBuf {
        self.root.join(version_tag)
    }

    /// Store a version and repoint `latest` at it.
    pub fn save(
        &self,
        version_tag: &str,
        artifacts: RegistryArtifacts<'_>,
    ) -> Result<PathBuf, StorageError> {
        validate_version_tag(version_tag)?;
        let lock = RegistryLock::acquire(&self.root)?;
        debug!(lock = %lock.path().display(), version = version_tag, "Registry locked");

        let staging = self.root.join(format!(".staging-{version_tag}"));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(StorageError::io(&staging))?;
        }
        fs::create_dir_all(&staging).map_err(StorageError::io(&staging))?;

        let json = artifacts.thresholds.to_json_pretty()?;
        write_atomic(&staging.join(THRESHOLDS_FILE_NAME), json.as_bytes())?;
        write_atomic(
            &staging.join(METRICS_FILE_NAME),
            metrics::to_csv(artifacts.metrics).as_bytes(),
        )?;

        let mut meta = artifacts.meta.clone();
        meta.saved_at.get_or_insert_with(Utc::now);
        write_atomic(
            &staging.join(META_FILE_NAME),
            serde_json::to_string_pretty(&meta)?.as_bytes(),
        )?;

        let vdir = self.version_dir(version_tag);
        let backup = self.root.join(format!(".old-{version_tag}"));
        if let Err(e) = replace_dir(&staging, &vdir, &backup) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "Failed to remove staging directory"
                );
            }
            return Err(e);
        }

        self.point_latest(version_tag)?;

        info!(
            path = %vdir.display(),
            axes = artifacts.thresholds.len(),
            "Registry version saved"
        );
        Ok(vdir)
    }

    fn point_latest(&self, version_tag: &str) -> Result<(), StorageError> {
        let latest = self.root.join(LATEST_POINTER);
        if let Ok(md) = fs::symlink_metadata(&latest) {
            let removed = if md.is_dir() {
                fs::remove_dir_all(&latest)
            } else {
                fs::remove_file(&latest)
            };
            removed.map_err(StorageError::io(&latest))?;
        }

        #[cfg(unix)]
        {
            if std::os::unix::fs::symlink(version_tag, &latest).is_ok() {
                return Ok(());
            }
            warn!("Could not symlink latest pointer, copying version instead");
        }

        copy_dir(&self.version_dir(version_tag), &latest)
    }

    /// Thresholds of a saved version.
    pub fn load_thresholds(&self, version_tag: &str) -> Result<ThresholdSet, StorageError> {
        validate_version_tag(version_tag)?;
        let path = self.version_dir(version_tag).join(THRESHOLDS_FILE_NAME);
        if !path.exists() {
            return Err(StorageError::VersionNotFound(version_tag.to_string()));
        }
        load_thresholds(&path)
    }

    /// Thresholds behind the `latest` pointer.
    pub fn load_latest(&self) -> Result<ThresholdSet, StorageError> {
        let path = self.root.join(LATEST_POINTER).join(THRESHOLDS_FILE_NAME);
        if !path.exists() {
            return Err(StorageError::VersionNotFound(LATEST_POINTER.to_string()));
        }
        load_thresholds(&path)
    }

    /// Metadata of a saved version.
    pub fn load_meta(&self, version_tag: &str) -> Result<RegistryMeta, StorageError> {
        validate_version_tag(version_tag)?;
        let path = self.version_dir(version_tag).join(META_FILE_NAME);
        let json = fs::read_to_string(&path).map_err(StorageError::io(&path))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Saved version tags, sorted.
    pub fn versions(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(self.root.clone(), e)),
        };
        let mut tags: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name != LATEST_POINTER && !name.starts_with('.'))
            .collect();
        tags.sort();
        Ok(tags)
    }
}

/// Moves `staging` to `target`. An existing `target` is parked at `backup`
/// and only deleted once the new directory is in place; on failure it is
/// moved back.
fn replace_dir(staging: &Path, target: &Path, backup: &Path) -> Result<(), StorageError> {
    if backup.exists() {
        fs::remove_dir_all(backup).map_err(StorageError::io(backup))?;
    }
    let replacing = target.exists();
    if replacing {
        debug!(path = %target.display(), "Replacing existing registry version");
        fs::rename(target, backup).map_err(StorageError::io(target))?;
    }

    if let Err(e) = fs::rename(staging, target) {
        if replacing {
            if let Err(restore) = fs::rename(backup, target) {
                warn!(
                    backup = %backup.display(),
                    error = %restore,
                    "Failed to restore previous registry version"
                );
            }
        }
        return Err(StorageError::Io(target.to_path_buf(), e));
    }

    if replacing {
        if let Err(e) = fs::remove_dir_all(backup) {
            warn!(
                path = %backup.display(),
                error = %e,
                "Failed to remove replaced registry version"
            );
        }
    }
    Ok(())
}

/// Persists a set as one registry version, together with its fit metrics
/// and provenance.
#[derive(Debug, Clone, Copy)]
pub struct RegistrySink<'a> {
    registry: &'a ModelRegistry,
    version_tag: &'a str,
    metrics: &'a [AxisMetrics],
    meta: &'a RegistryMeta,
}

impl<'a> RegistrySink<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        version_tag: &'a str,
        metrics: &'a [AxisMetrics],
        meta: &'a RegistryMeta,
    ) -> Self {
        Self {
            registry,
            version_tag,
            metrics,
            meta,
        }
    }
}

impl ThresholdSink for RegistrySink<'_> {
    fn persist(&self, set: &ThresholdSet) -> Result<PathBuf, StorageError> {
        self.registry.save(
            self.version_tag,
            RegistryArtifacts {
                thresholds: set,
                metrics: self.metrics,
                meta: self.meta,
            },
        )
    }
}

/// A tag becomes a directory name directly under the root.
pub fn validate_version_tag(tag: &str) -> Result<(), StorageError> {
    let invalid = tag.is_empty()
        || tag == LATEST_POINTER
        || tag.starts_with('.')
        || tag.contains(['/', '\\'])
        || tag.chars().any(char::is_control);
    if invalid {
        return Err(StorageError::InvalidVersionTag(tag.to_string()));
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(to).map_err(StorageError::io(to))?;
    for entry in fs::read_dir(from).map_err(StorageError::io(from))? {
        let entry = entry.map_err(StorageError::io(from))?;
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(StorageError::io(&target))?;
        }
    }
    Ok(())
}
