//! Dwell-Time Calibrator
//!
//! Converts second-based dwell defaults into sample steps using the measured
//! sampling interval, then raises them by a quantile of the observed
//! crossing run lengths. A dwell requirement is never lowered below the
//! configured default.

use super::policy::CalibrationPolicy;
use super::stats;
use tracing::warn;

/// Floor for the sampling interval so step conversion never divides by zero.
pub const DT_EPSILON_SECONDS: f64 = 1e-9;

/// Clamp a measured sampling interval away from zero.
///
/// Non-finite or non-positive intervals (unmeasured, single-row datasets)
/// collapse to [`DT_EPSILON_SECONDS`].
pub fn clamp_dt(dt_seconds: f64) -> f64 {
    if dt_seconds.is_nan() || dt_seconds <= 0.0 {
        warn!(dt_seconds, "Degenerate sampling interval, clamping to epsilon");
    }
    // f64::max ignores a NaN operand
    dt_seconds.max(DT_EPSILON_SECONDS)
}

/// `max(1, round(seconds / max(dt, ε)))`, rounding half to even.
pub fn steps_from_seconds(seconds: f64, dt_seconds: f64) -> u64 {
    let steps = (seconds / dt_seconds.max(DT_EPSILON_SECONDS)).round_ties_even();
    // Saturating float-to-int cast; NaN maps to 0 and is lifted to 1
    (steps as u64).max(1)
}

/// `max(default_steps, ceil(quantile(runs, q)))`, or `default_steps` when no runs.
pub fn raise_by_quantile(runs: &[usize], q: f64, default_steps: u64) -> u64 {
    let sorted = stats::sorted(&runs.iter().map(|&r| r as f64).collect::<Vec<_>>());
    match stats::quantile_sorted(&sorted, q) {
        Some(value) => default_steps.max(value.ceil() as u64),
        None => default_steps,
    }
}

/// Step defaults for one calibration run.
///
/// The sampling interval is shared across axes, so the second-to-step
/// conversion happens once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellCalibrator {
    dt_seconds: f64,
    default_alert_steps: u64,
    default_error_steps: u64,
    alert_quantile: f64,
    error_quantile: f64,
}

impl DwellCalibrator {
    pub fn new(policy: &CalibrationPolicy, dt_seconds: f64) -> Self {
        let p = policy.params();
        let dt = clamp_dt(dt_seconds);
        Self {
            dt_seconds: dt,
            default_alert_steps: steps_from_seconds(p.alert_seconds_default, dt),
            default_error_steps: steps_from_seconds(p.error_seconds_default, dt),
            alert_quantile: p.alert_quantile,
            error_quantile: p.error_quantile,
        }
    }

    pub fn dt_seconds(&self) -> f64 {
        self.dt_seconds
    }

    pub fn default_alert_steps(&self) -> u64 {
        self.default_alert_steps
    }

    pub fn default_error_steps(&self) -> u64 {
        self.default_error_steps
    }

    /// `T_long_steps` from the alert-mask (residual >= MinC) run lengths.
    pub fn long_steps(&self, alert_runs: &[usize]) -> u64 {
        raise_by_quantile(alert_runs, self.alert_quantile, self.default_alert_steps)
    }

    /// `T_short_steps` from the error-mask (residual >= MaxC) run lengths.
    pub fn short_steps(&self, error_runs: &[usize]) -> u64 {
        raise_by_quantile(error_runs, self.error_quantile, self.default_error_steps)
    }
}
