//! Axis Thresholds: per-axis residual threshold calibration
//!
//! Calibrates alerting parameters for multi-axis machine monitoring from the
//! residuals (observed minus predicted) of per-axis baseline models.
//!
//! ## Architecture
//!
//! - **Source**: per-axis residual series and the dataset sampling interval
//! - **Calibration**: robust magnitude estimation, crossing run lengths, dwell steps
//! - **Metrics**: residual fit quality per axis
//! - **Storage**: atomic `thresholds.json` writes and a versioned artifact registry
//! - **Config**: TOML run configuration with defaults and typo detection

pub mod calibration;
pub mod config;
pub mod metrics;
pub mod source;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{CalibConfig, ConfigError, ThresholdPolicy};

// Re-export calibration components
pub use calibration::{
    AxisCalibration, CalibrationError, CalibrationPolicy, DwellCalibrator, PolicyError,
    RobustEstimator, ThresholdCalibrator,
};

// Re-export domain types
pub use types::{AxisThreshold, EstimateMethod, ResidualSeries, ThresholdMeta, ThresholdSet};

// Re-export boundaries
pub use metrics::AxisMetrics;
pub use source::{CsvResidualSource, InMemorySource, ResidualSource, SourceError};
pub use storage::{JsonFileSink, ModelRegistry, StorageError, ThresholdSink};
