//! Trimmed Robust Estimator
//!
//! Turns the strictly positive residuals of one axis into the alert (MinC)
//! and error (MaxC) magnitude thresholds.
//!
//! ## Branches
//!
//! 1. No positive residuals: both bounds are `0.0` (`degenerate`).
//! 2. Fewer than `min_pos_for_trim` positives with the MAD fallback enabled:
//!    `MinC = med + 2·MAD`, `MaxC = med + 3·MAD` (`median+MAD`).
//! 3. Otherwise: optionally discard the largest `trim_top_ratio` fraction,
//!    then take the `minc_percentile`/`maxc_percentile` linear-interpolation
//!    percentiles (`trim_top=<ratio>`).
//!
//! One branch decision covers both bounds of an axis.

use super::policy::CalibrationPolicy;
use super::stats;
use crate::types::EstimateMethod;

/// MAD multiplier for the alert bound in the small-sample fallback.
pub const MAD_ALERT_FACTOR: f64 = 2.0;

/// MAD multiplier for the error bound in the small-sample fallback.
pub const MAD_ERROR_FACTOR: f64 = 3.0;

/// MinC/MaxC for one axis plus the branch that produced them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeEstimate {
    pub min_c: f64,
    pub max_c: f64,
    pub method: EstimateMethod,
}

impl MagnitudeEstimate {
    const fn degenerate() -> Self {
        Self {
            min_c: 0.0,
            max_c: 0.0,
            method: EstimateMethod::Degenerate,
        }
    }
}

/// Pure estimator over a validated policy.
#[derive(Debug, Clone, Copy)]
pub struct RobustEstimator<'a> {
    policy: &'a CalibrationPolicy,
}

impl<'a> RobustEstimator<'a> {
    pub fn new(policy: &'a CalibrationPolicy) -> Self {
        Self { policy }
    }

    /// Estimate MinC/MaxC from strictly positive, finite residuals.
    pub fn estimate(&self, positive: &[f64]) -> MagnitudeEstimate {
        let p = self.policy.params();

        if positive.is_empty() {
            return MagnitudeEstimate::degenerate();
        }

        if positive.len() < p.min_pos_for_trim && p.use_mad_fallback {
            // Non-empty input always has a median
            let (med, mad) = stats::median_mad(positive).unwrap_or((0.0, 0.0));
            return MagnitudeEstimate {
                min_c: med + MAD_ALERT_FACTOR * mad,
                max_c: med + MAD_ERROR_FACTOR * mad,
                method: EstimateMethod::MedianMad,
            };
        }

        let effective = self.trimmed(positive);
        MagnitudeEstimate {
            min_c: stats::percentile_sorted(&effective, p.minc_percentile).unwrap_or(0.0),
            max_c: stats::percentile_sorted(&effective, p.maxc_percentile).unwrap_or(0.0),
            method: EstimateMethod::Percentile {
                trim_top_ratio: p.trim_top_ratio,
            },
        }
    }

    /// Ascending positives with the top `trim_top_ratio` fraction removed.
    ///
    /// Trimming only applies once at least `min_pos_for_trim` samples exist,
    /// and always keeps at least one value.
    pub fn trimmed(&self, positive: &[f64]) -> Vec<f64> {
        let p = self.policy.params();
        let mut s = stats::sorted(positive);
        if p.trim_top_ratio > 0.0 && s.len() >= p.min_pos_for_trim {
            let keep = (s.len() as f64 * (1.0 - p.trim_top_ratio)).floor() as usize;
            s.truncate(keep.max(1));
        }
        s
    }
}
