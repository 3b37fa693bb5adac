//! Residual Source
//!
//! Boundary between the model-fitting stage and threshold calibration. A
//! source hands out one [`ResidualSeries`] per axis, all aligned to a common
//! time base, plus a single representative sampling interval shared by every
//! axis.
//!
//! - `InMemorySource`: residuals already held by the caller
//! - `CsvResidualSource`: `<time_col>, <axis><suffix>, ...` files written by the fitting stage
//! - `SeriesProfile`: median inter-sample interval of a time column

mod csv;
mod profile;

pub use self::csv::{discover_axes, CsvResidualSource};
pub use profile::{parse_time_seconds, SeriesProfile};

use crate::types::ResidualSeries;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Residual file {0} has no header row")]
    Empty(PathBuf),

    #[error("Time column '{column}' not found in {path}")]
    MissingTimeColumn { path: PathBuf, column: String },
}

/// Supplier of per-axis residuals.
///
/// `Sync` so axes can be calibrated concurrently from one shared source.
pub trait ResidualSource: Sync {
    /// Representative (median) sampling interval of the dataset, in seconds.
    fn dt_seconds(&self) -> f64;

    /// Residuals for `axis`, or `None` when the source has no such axis.
    fn residuals(&self, axis: &str) -> Option<&ResidualSeries>;

    /// Observed values for `axis`, when the source carries them.
    fn observed(&self, _axis: &str) -> Option<&[f64]> {
        None
    }
}

/// Residuals supplied directly by the caller.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    dt_seconds: f64,
    residuals: HashMap<String, ResidualSeries>,
    observed: HashMap<String, Vec<f64>>,
}

impl InMemorySource {
    pub fn new(dt_seconds: f64) -> Self {
        Self {
            dt_seconds,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_axis(
        mut self,
        axis: impl Into<String>,
        residuals: impl Into<ResidualSeries>,
    ) -> Self {
        self.residuals.insert(axis.into(), residuals.into());
        self
    }

    #[must_use]
    pub fn with_observed(mut self, axis: impl Into<String>, observed: Vec<f64>) -> Self {
        self.observed.insert(axis.into(), observed);
        self
    }
}

impl ResidualSource for InMemorySource {
    fn dt_seconds(&self) -> f64 {
        self.dt_seconds
    }

    fn residuals(&self, axis: &str) -> Option<&ResidualSeries> {
        self.residuals.get(axis)
    }

    fn observed(&self, axis: &str) -> Option<&[f64]> {
        self.observed.get(axis).map(Vec::as_slice)
    }
}
