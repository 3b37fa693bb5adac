//! Residual sequences for a single axis

use serde::{Deserialize, Serialize};

/// Ordered residuals for one axis, aligned to the dataset's common time base.
///
/// Values may be non-finite: missing cells in the residual source surface as
/// NaN and are never interpolated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidualSeries {
    values: Vec<f64>,
}

impl ResidualSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Strictly positive, finite residuals in their original order.
    ///
    /// NaN and infinities are excluded: a threshold estimated from an
    /// infinite order statistic would be meaningless downstream.
    pub fn positive(&self) -> Vec<f64> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect()
    }

    /// Threshold-crossing mask over the full series (`residual >= threshold`).
    ///
    /// Plain IEEE comparison: NaN never crosses, `+inf` crosses any finite threshold.
    pub fn crossing_mask(&self, threshold: f64) -> Vec<bool> {
        self.values.iter().map(|&v| v >= threshold).collect()
    }
}

impl From<Vec<f64>> for ResidualSeries {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<f64> for ResidualSeries {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
