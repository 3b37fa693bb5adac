//! Built-in defaults, grouped by config section.

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable naming a config file to load.
pub const CONFIG_ENV_VAR: &str = "AXIS_THRESHOLDS_CONFIG";

/// Config file looked up in the current working directory.
pub const DEFAULT_CONFIG_FILE: &str = "calibration.toml";

// ============================================================================
// [run]
// ============================================================================

pub const DEFAULT_RUN_NAME: &str = "calibration";

/// Registry version directory used when none is configured.
pub const DEFAULT_VERSION_TAG: &str = "v1";

// ============================================================================
// [input]
// ============================================================================

pub const DEFAULT_RESIDUALS_CSV: &str = "out/residuals.csv";

pub const DEFAULT_TIME_COL: &str = "time_s";

/// Residual column for axis `a` is `a` followed by this suffix.
pub const DEFAULT_RESIDUAL_SUFFIX: &str = "_res";

// ============================================================================
// [thresholds]
// ============================================================================

pub const DEFAULT_MINC_PERCENTILE: f64 = 95.0;
pub const DEFAULT_MAXC_PERCENTILE: f64 = 99.0;
pub const DEFAULT_TRIM_TOP_RATIO: f64 = 0.0;

/// Below this many positive residuals the estimator switches to median+MAD.
pub const DEFAULT_MIN_POS_FOR_TRIM: usize = 20;

pub const DEFAULT_USE_MAD_FALLBACK: bool = true;

/// Dwell floors, converted to steps with the dataset sampling interval.
pub const DEFAULT_ALERT_SECONDS: f64 = 10.0;
pub const DEFAULT_ERROR_SECONDS: f64 = 3.0;

/// Run-length quantiles that may raise the dwell floors.
pub const DEFAULT_ALERT_QUANTILE: f64 = 0.90;
pub const DEFAULT_ERROR_QUANTILE: f64 = 0.50;

// ============================================================================
// [output]
// ============================================================================

pub const DEFAULT_OUT_DIR: &str = "out";
