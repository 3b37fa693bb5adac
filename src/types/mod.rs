//! Shared data structures for residual-based threshold calibration
//!
//! - `ResidualSeries`: one axis' residuals (observed minus predicted), one per sample
//! - `AxisThreshold`: calibrated MinC/MaxC magnitudes and dwell step counts for one axis
//! - `ThresholdSet`: every axis of a calibration run, keyed by axis name

mod series;
mod thresholds;

pub use series::*;
pub use thresholds::*;
