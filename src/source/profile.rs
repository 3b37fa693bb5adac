//! Time-column profiling
//!
//! The representative sampling interval is the median gap between
//! consecutive timestamps. Gaps touching a missing timestamp are dropped.

use crate::calibration::stats;
use chrono::{DateTime, NaiveDateTime};

/// Summary of a dataset's time column.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesProfile {
    pub n_rows: usize,
    /// Median inter-sample gap; `0.0` with fewer than two rows or no usable gaps.
    pub dt_seconds: f64,
    /// Earliest finite timestamp (seconds).
    pub head: Option<f64>,
    /// Latest finite timestamp (seconds).
    pub tail: Option<f64>,
}

impl SeriesProfile {
    pub fn from_times(times: &[f64]) -> Self {
        let finite = times.iter().copied().filter(|t| t.is_finite());
        let head = finite.clone().reduce(f64::min);
        let tail = finite.reduce(f64::max);

        let dt_seconds = if times.len() < 2 {
            0.0
        } else {
            let gaps: Vec<f64> = times
                .windows(2)
                .map(|w| w[1] - w[0])
                .filter(|g| g.is_finite())
                .collect();
            stats::median_sorted(&stats::sorted(&gaps)).unwrap_or(0.0)
        };

        Self {
            n_rows: times.len(),
            dt_seconds,
            head,
            tail,
        }
    }
}

/// Parse a time cell as seconds.
///
/// Accepts plain numbers (already seconds), RFC 3339 timestamps, and naive
/// `YYYY-MM-DD HH:MM:SS[.fff]` timestamps read as UTC. Anything else is NaN.
pub fn parse_time_seconds(cell: &str) -> f64 {
    let cell = cell.trim();
    if cell.is_empty() {
        return f64::NAN;
    }
    if let Ok(v) = cell.parse::<f64>() {
        return v;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) * 1e-9;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, fmt) {
            let utc = naive.and_utc();
            return utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1e-9;
        }
    }
    f64::NAN
}
