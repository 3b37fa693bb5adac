//! Residual fit metrics
//!
//! Per-axis MAE and RMSE from the residuals, and R² when the source also
//! carries the observed values. Only samples where every needed value is
//! finite contribute.

use crate::source::ResidualSource;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMetrics {
    pub axis: String,
    /// Coefficient of determination; absent without observed values or when
    /// the observed values have zero variance.
    pub r2: Option<f64>,
    pub mae: f64,
    pub rmse: f64,
}

impl AxisMetrics {
    /// Compute metrics from residuals (observed minus predicted).
    ///
    /// Returns `None` when there is no finite residual to score.
    pub fn compute(axis: &str, residuals: &[f64], observed: Option<&[f64]>) -> Option<Self> {
        let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let n = finite.len() as f64;
        let mae = finite.iter().map(|r| r.abs()).sum::<f64>() / n;
        let rmse = (finite.iter().map(|r| r * r).sum::<f64>() / n).sqrt();

        let r2 = observed.and_then(|obs| r_squared(residuals, obs));

        Some(Self {
            axis: axis.to_string(),
            r2,
            mae,
            rmse,
        })
    }
}

fn r_squared(residuals: &[f64], observed: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = residuals
        .iter()
        .zip(observed)
        .filter(|(r, y)| r.is_finite() && y.is_finite())
        .map(|(&r, &y)| (r, y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / pairs.len() as f64;
    let ss_res: f64 = pairs.iter().map(|(r, _)| r * r).sum();
    let ss_tot: f64 = pairs.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    if ss_tot <= 0.0 {
        return None;
    }
    Some(1.0 - ss_res / ss_tot)
}

/// Metrics for each axis of `source`, in `axes` order. Axes without
/// residuals or without a finite residual are skipped.
pub fn evaluate<S: ResidualSource + ?Sized>(source: &S, axes: &[String]) -> Vec<AxisMetrics> {
    axes.iter()
        .filter_map(|axis| {
            let series = source.residuals(axis)?;
            AxisMetrics::compute(axis, series.values(), source.observed(axis))
        })
        .collect()
}

/// Render metrics as `axis,r2,mae,rmse` CSV; a missing R² is an empty cell.
pub fn to_csv(metrics: &[AxisMetrics]) -> String {
    let mut out = String::from("axis,r2,mae,rmse\n");
    for m in metrics {
        let r2 = m.r2.map(|v| v.to_string()).unwrap_or_default();
        let _ = writeln!(out, "{},{},{},{}", m.axis, r2, m.mae, m.rmse);
    }
    out
}
