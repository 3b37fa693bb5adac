//! Threshold Calibration - residual magnitudes and dwell times per axis
//!
//! Turns the residuals of per-axis baseline models into the parameters an
//! alerting consumer applies: two magnitude thresholds and two minimum dwell
//! times per axis.
//!
//! ## Architecture
//!
//! - `RobustEstimator`: MinC/MaxC from positive residuals (trimmed percentiles or median+MAD)
//! - `RunLengths`: persistence of threshold crossings
//! - `DwellCalibrator`: seconds-to-steps conversion, raised by run-length quantiles
//! - `ThresholdCalibrator`: per-axis orchestration into a `ThresholdSet`
//!
//! ## Usage
//!
//! ```ignore
//! let calibrator = ThresholdCalibrator::from_params(config.thresholds.clone())?;
//! let source = CsvResidualSource::load(&path, &config.input)?;
//! let sink = JsonFileSink::new("out");
//! let (set, locations) = calibrator.calibrate_and_persist(&source, source.axes(), &[&sink])?;
//! ```

pub mod dwell;
pub mod estimator;
pub mod orchestrator;
pub mod policy;
pub mod run_length;
pub mod stats;

pub use dwell::{steps_from_seconds, DwellCalibrator, DT_EPSILON_SECONDS};
pub use estimator::{MagnitudeEstimate, RobustEstimator};
pub use orchestrator::{AxisCalibration, ThresholdCalibrator};
pub use policy::{CalibrationPolicy, PolicyError};
pub use run_length::{run_lengths, RunLengths};

use crate::storage::StorageError;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Configuration(#[from] PolicyError),

    #[error("No residual data for axis: {0}")]
    MissingAxis(String),

    #[error("Residual series for axis {0} is empty")]
    EmptySeries(String),

    #[error("No axes requested for calibration")]
    NoAxes,

    #[error("Failed to persist threshold set: {0}")]
    Persistence(#[from] StorageError),
}
