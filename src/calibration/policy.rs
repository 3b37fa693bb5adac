//! Validated calibration policy
//!
//! `CalibrationPolicy` can only be obtained through [`CalibrationPolicy::new`],
//! which rejects every out-of-domain field up front so that no calibration
//! ever starts with a policy it cannot honour.

use crate::config::ThresholdPolicy;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid calibration policy: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Immutable, validated thresholding policy.
///
/// `Default` carries the built-in parameters, which always validate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationPolicy {
    params: ThresholdPolicy,
}

impl CalibrationPolicy {
    /// Validate raw policy parameters.
    ///
    /// All violations are collected and reported together.
    pub fn new(params: ThresholdPolicy) -> Result<Self, PolicyError> {
        let mut errors: Vec<String> = Vec::new();

        check_percentile(params.minc_percentile, "minc_percentile", &mut errors);
        check_percentile(params.maxc_percentile, "maxc_percentile", &mut errors);

        if !(0.0..1.0).contains(&params.trim_top_ratio) {
            errors.push(format!(
                "trim_top_ratio = {} must be in [0, 1)",
                params.trim_top_ratio
            ));
        }
        if params.min_pos_for_trim == 0 {
            errors.push("min_pos_for_trim must be > 0".to_string());
        }

        check_positive_seconds(params.alert_seconds_default, "alert_seconds_default", &mut errors);
        check_positive_seconds(params.error_seconds_default, "error_seconds_default", &mut errors);

        check_open_unit(params.alert_quantile, "alert_quantile", &mut errors);
        check_open_unit(params.error_quantile, "error_quantile", &mut errors);

        if !errors.is_empty() {
            return Err(PolicyError::Invalid(errors));
        }

        if params.minc_percentile > params.maxc_percentile {
            warn!(
                minc_percentile = params.minc_percentile,
                maxc_percentile = params.maxc_percentile,
                "minc_percentile exceeds maxc_percentile, MinC may exceed MaxC"
            );
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &ThresholdPolicy {
        &self.params
    }
}

fn check_percentile(value: f64, name: &str, errors: &mut Vec<String>) {
    if !(0.0..=100.0).contains(&value) {
        errors.push(format!("{name} = {value} must be in [0, 100]"));
    }
}

fn check_positive_seconds(value: f64, name: &str, errors: &mut Vec<String>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(format!("{name} = {value} must be a positive number of seconds"));
    }
}

fn check_open_unit(value: f64, name: &str, errors: &mut Vec<String>) {
    if !(value > 0.0 && value < 1.0) {
        errors.push(format!("{name} = {value} must be in (0, 1)"));
    }
}
