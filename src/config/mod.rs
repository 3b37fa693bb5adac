//! Run Configuration
//!
//! Calibration runs are driven by a TOML file; every field has a built-in
//! default so an empty (or absent) file is a valid configuration.
//!
//! ## Loading Order
//!
//! 1. `AXIS_THRESHOLDS_CONFIG` environment variable (path to TOML file)
//! 2. `calibration.toml` in the current working directory
//! 3. Built-in defaults, only when neither file is named or present
//!
//! ```ignore
//! let config = CalibConfig::load()?;
//! let calibrator = ThresholdCalibrator::from_params(config.thresholds.clone())?;
//! ```

mod calib_config;
pub mod defaults;
pub mod validation;

pub use calib_config::*;
