//! Calibration run configuration as TOML.
//!
//! Each struct implements `Default` with the built-in values from
//! [`super::defaults`], and every field falls back to its default when
//! missing from the file.

use super::defaults::*;
use crate::calibration::{CalibrationPolicy, PolicyError};
use crate::storage::registry::validate_version_tag;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a calibration run.
///
/// Load with `CalibConfig::load()` which searches:
/// 1. `$AXIS_THRESHOLDS_CONFIG` env var
/// 2. `./calibration.toml`
/// 3. Built-in defaults (no file named or present)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibConfig {
    /// Run identification, recorded in registry metadata
    #[serde(default)]
    pub run: RunInfo,

    /// Where residuals come from and which axes to calibrate
    #[serde(default)]
    pub input: InputConfig,

    /// Thresholding policy
    #[serde(default)]
    pub thresholds: ThresholdPolicy,

    /// Where calibrated sets are written
    #[serde(default)]
    pub output: OutputConfig,
}

impl CalibConfig {
    /// Load configuration using the standard search order:
    /// 1. `$AXIS_THRESHOLDS_CONFIG` environment variable
    /// 2. `./calibration.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// Defaults apply only when no config file is named or present. A file
    /// that is named but missing, unparsable or invalid is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::load_from_search(env_path, Path::new("."))
    }

    /// Search order of [`CalibConfig::load`] with the env var value and the
    /// working directory supplied by the caller.
    pub fn load_from_search(env_path: Option<PathBuf>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = env_path {
            let config = Self::load_from_file(&path)?;
            info!(
                path = %path.display(),
                run = %config.run.name,
                "Loaded config from {CONFIG_ENV_VAR}"
            );
            return Ok(config);
        }

        let local = dir.join(DEFAULT_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!(path = %local.display(), run = %config.run.name, "Loaded config");
            return Ok(config);
        }

        info!("No {DEFAULT_CONFIG_FILE} found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys and suspicious values are
    /// logged as warnings and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;

        for w in super::validation::validate_suspicious_values(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validated policy for the `[thresholds]` section.
    pub fn policy(&self) -> Result<CalibrationPolicy, ConfigError> {
        CalibrationPolicy::new(self.thresholds.clone()).map_err(|PolicyError::Invalid(errors)| {
            ConfigError::Validation(errors)
        })
    }

    /// Validate every section, collecting all problems.
    ///
    /// Rules:
    /// - `[thresholds]` must form a valid calibration policy
    /// - Time column and residual suffix must be non-empty
    /// - Configured axes must be unique, non-empty names
    /// - The version tag must be usable as a registry directory name
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if let Err(PolicyError::Invalid(policy_errors)) =
            CalibrationPolicy::new(self.thresholds.clone())
        {
            errors.extend(policy_errors.into_iter().map(|e| format!("thresholds: {e}")));
        }

        let input = &self.input;
        if input.time_col.trim().is_empty() {
            errors.push("input.time_col must not be empty".to_string());
        }
        if input.residual_suffix.is_empty() {
            errors.push("input.residual_suffix must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for axis in &input.axes {
            if axis.trim().is_empty() {
                errors.push("input.axes contains an empty axis name".to_string());
            } else if !seen.insert(axis.as_str()) {
                errors.push(format!("input.axes lists '{axis}' more than once"));
            }
        }

        if self.output.out_dir.as_os_str().is_empty() {
            errors.push("output.out_dir must not be empty".to_string());
        }
        if validate_version_tag(&self.run.version_tag).is_err() {
            errors.push(format!(
                "run.version_tag = '{}' must be a plain directory name other than 'latest'",
                self.run.version_tag
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// [run]
// ============================================================================

/// Identification metadata. Not used for logic, but stored with every
/// registry version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    #[serde(default = "default_run_name")]
    pub name: String,

    /// Registry version directory for this run's artifacts
    #[serde(default = "default_version_tag")]
    pub version_tag: String,
}

fn default_run_name() -> String {
    DEFAULT_RUN_NAME.to_string()
}
fn default_version_tag() -> String {
    DEFAULT_VERSION_TAG.to_string()
}

impl Default for RunInfo {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            version_tag: default_version_tag(),
        }
    }
}

// ============================================================================
// [input]
// ============================================================================

/// Residual file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// CSV written by the model-fitting stage
    #[serde(default = "default_residuals_csv")]
    pub residuals_csv: PathBuf,

    /// Time column (numeric seconds or timestamps)
    #[serde(default = "default_time_col")]
    pub time_col: String,

    /// Residual column of axis `a` is `<a><residual_suffix>`
    #[serde(default = "default_residual_suffix")]
    pub residual_suffix: String,

    /// Axes to calibrate; empty means every residual column in header order
    #[serde(default)]
    pub axes: Vec<String>,
}

fn default_residuals_csv() -> PathBuf {
    PathBuf::from(DEFAULT_RESIDUALS_CSV)
}
fn default_time_col() -> String {
    DEFAULT_TIME_COL.to_string()
}
fn default_residual_suffix() -> String {
    DEFAULT_RESIDUAL_SUFFIX.to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            residuals_csv: default_residuals_csv(),
            time_col: default_time_col(),
            residual_suffix: default_residual_suffix(),
            axes: Vec::new(),
        }
    }
}

// ============================================================================
// [thresholds]
// ============================================================================

/// Raw thresholding parameters. Validate through
/// [`CalibrationPolicy::new`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Percentile of trimmed positives used as MinC, in [0, 100]
    #[serde(default = "default_minc_percentile")]
    pub minc_percentile: f64,

    /// Percentile of trimmed positives used as MaxC, in [0, 100]
    #[serde(default = "default_maxc_percentile")]
    pub maxc_percentile: f64,

    /// Fraction of the largest positives dropped before the percentiles, in [0, 1)
    #[serde(default = "default_trim_top_ratio")]
    pub trim_top_ratio: f64,

    /// Minimum positive count for the percentile branch
    #[serde(default = "default_min_pos_for_trim")]
    pub min_pos_for_trim: usize,

    /// Use median+MAD when there are too few positives
    #[serde(default = "default_use_mad_fallback")]
    pub use_mad_fallback: bool,

    /// Alert dwell floor (seconds)
    #[serde(default = "default_alert_seconds")]
    pub alert_seconds_default: f64,

    /// Error dwell floor (seconds)
    #[serde(default = "default_error_seconds")]
    pub error_seconds_default: f64,

    /// Alert run-length quantile, in (0, 1)
    #[serde(default = "default_alert_quantile")]
    pub alert_quantile: f64,

    /// Error run-length quantile, in (0, 1)
    #[serde(default = "default_error_quantile")]
    pub error_quantile: f64,
}

fn default_minc_percentile() -> f64 {
    DEFAULT_MINC_PERCENTILE
}
fn default_maxc_percentile() -> f64 {
    DEFAULT_MAXC_PERCENTILE
}
fn default_trim_top_ratio() -> f64 {
    DEFAULT_TRIM_TOP_RATIO
}
fn default_min_pos_for_trim() -> usize {
    DEFAULT_MIN_POS_FOR_TRIM
}
fn default_use_mad_fallback() -> bool {
    DEFAULT_USE_MAD_FALLBACK
}
fn default_alert_seconds() -> f64 {
    DEFAULT_ALERT_SECONDS
}
fn default_error_seconds() -> f64 {
    DEFAULT_ERROR_SECONDS
}
fn default_alert_quantile() -> f64 {
    DEFAULT_ALERT_QUANTILE
}
fn default_error_quantile() -> f64 {
    DEFAULT_ERROR_QUANTILE
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            minc_percentile: default_minc_percentile(),
            maxc_percentile: default_maxc_percentile(),
            trim_top_ratio: default_trim_top_ratio(),
            min_pos_for_trim: default_min_pos_for_trim(),
            use_mad_fallback: default_use_mad_fallback(),
            alert_seconds_default: default_alert_seconds(),
            error_seconds_default: default_error_seconds(),
            alert_quantile: default_alert_quantile(),
            error_quantile: default_error_quantile(),
        }
    }
}

// ============================================================================
// [output]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `thresholds.json`
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Versioned artifact registry root; omitted means no registry write
    #[serde(default)]
    pub registry_dir: Option<PathBuf>,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUT_DIR)
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            registry_dir: None,
        }
    }
}
