//! Axis orchestration: one independent calibration per axis, merged into a
//! [`ThresholdSet`].
//!
//! Axes are dispatched over the rayon pool. Each worker returns its keyed
//! record and the merge happens on the calling thread, so no lock is held
//! across axes. Any per-axis failure aborts the whole run: a set silently
//! missing an axis is worse than no set at all.

use super::dwell::DwellCalibrator;
use super::estimator::RobustEstimator;
use super::policy::CalibrationPolicy;
use super::run_length::run_lengths;
use super::CalibrationError;
use crate::config::ThresholdPolicy;
use crate::source::ResidualSource;
use crate::storage::ThresholdSink;
use crate::types::{AxisThreshold, EstimateMethod, ResidualSeries, ThresholdMeta, ThresholdSet};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Full per-axis outcome, including the crossing run lengths behind the
/// dwell counts.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisCalibration {
    pub threshold: AxisThreshold,
    pub method: EstimateMethod,
    /// Runs of `residual >= MinC`.
    pub alert_runs: Vec<usize>,
    /// Runs of `residual >= MaxC`.
    pub error_runs: Vec<usize>,
}

/// Calibrates per-axis thresholds under one validated policy.
#[derive(Debug, Clone, Default)]
pub struct ThresholdCalibrator {
    policy: CalibrationPolicy,
}

impl ThresholdCalibrator {
    pub fn new(policy: CalibrationPolicy) -> Self {
        Self { policy }
    }

    /// Validate raw policy parameters and build a calibrator.
    pub fn from_params(params: ThresholdPolicy) -> Result<Self, CalibrationError> {
        Ok(Self::new(CalibrationPolicy::new(params)?))
    }

    pub fn policy(&self) -> &CalibrationPolicy {
        &self.policy
    }

    /// Dwell step defaults for a dataset sampled every `dt_seconds`.
    pub fn dwell(&self, dt_seconds: f64) -> DwellCalibrator {
        DwellCalibrator::new(&self.policy, dt_seconds)
    }

    /// Calibrate a single axis. Pure: no I/O, no shared state.
    pub fn analyze_axis(
        &self,
        series: &ResidualSeries,
        dwell: &DwellCalibrator,
    ) -> AxisCalibration {
        let positive = series.positive();
        let estimate = RobustEstimator::new(&self.policy).estimate(&positive);

        // No estimated magnitude means nothing to cross
        let (alert_runs, error_runs) = if estimate.method.is_degenerate() {
            (Vec::new(), Vec::new())
        } else {
            (
                run_lengths(&series.crossing_mask(estimate.min_c)),
                run_lengths(&series.crossing_mask(estimate.max_c)),
            )
        };

        let threshold = AxisThreshold {
            min_c: estimate.min_c,
            max_c: estimate.max_c,
            t_long_steps: dwell.long_steps(&alert_runs),
            t_short_steps: dwell.short_steps(&error_runs),
            dt_seconds: dwell.dt_seconds(),
            meta: ThresholdMeta {
                method: estimate.method.to_string(),
            },
        };

        AxisCalibration {
            threshold,
            method: estimate.method,
            alert_runs,
            error_runs,
        }
    }

    fn calibrate_named<S: ResidualSource + ?Sized>(
        &self,
        source: &S,
        axis: &str,
        dwell: &DwellCalibrator,
    ) -> Result<AxisThreshold, CalibrationError> {
        let series = source
            .residuals(axis)
            .ok_or_else(|| CalibrationError::MissingAxis(axis.to_string()))?;
        if series.is_empty() {
            return Err(CalibrationError::EmptySeries(axis.to_string()));
        }

        let result = self.analyze_axis(series, dwell);
        let th = &result.threshold;
        if result.method.is_degenerate() {
            warn!(
                axis = %axis,
                samples = series.len(),
                "No positive residuals, thresholds set to zero"
            );
        }
        debug!(
            axis = %axis,
            min_c = th.min_c,
            max_c = th.max_c,
            t_long_steps = th.t_long_steps,
            t_short_steps = th.t_short_steps,
            alert_runs = result.alert_runs.len(),
            error_runs = result.error_runs.len(),
            method = %th.meta.method,
            "Axis calibrated"
        );
        Ok(result.threshold)
    }

    /// Calibrate every axis in `axes` from `source`.
    ///
    /// Fails on the first missing or empty axis (in `axes` order) without
    /// producing a partial set.
    pub fn calibrate<S: ResidualSource + ?Sized>(
        &self,
        source: &S,
        axes: &[String],
    ) -> Result<ThresholdSet, CalibrationError> {
        if axes.is_empty() {
            return Err(CalibrationError::NoAxes);
        }

        let dwell = self.dwell(source.dt_seconds());
        info!(
            axes = axes.len(),
            dt_seconds = dwell.dt_seconds(),
            default_alert_steps = dwell.default_alert_steps(),
            default_error_steps = dwell.default_error_steps(),
            "Calibrating thresholds"
        );

        let results: Vec<(&String, Result<AxisThreshold, CalibrationError>)> = axes
            .par_iter()
            .map(|axis| (axis, self.calibrate_named(source, axis, &dwell)))
            .collect();

        let mut records = Vec::with_capacity(results.len());
        for (axis, result) in results {
            records.push((axis.clone(), result?));
        }
        let set: ThresholdSet = records.into_iter().collect();

        info!(axes = set.len(), "Threshold calibration complete");
        Ok(set)
    }

    /// Calibrate, then hand the complete set to each sink exactly once, in
    /// order. The first sink that fails stops the run, so later sinks are
    /// never written with a set an earlier one rejected.
    pub fn calibrate_and_persist<S>(
        &self,
        source: &S,
        axes: &[String],
        sinks: &[&dyn ThresholdSink],
    ) -> Result<(ThresholdSet, Vec<PathBuf>), CalibrationError>
    where
        S: ResidualSource + ?Sized,
    {
        let set = self.calibrate(source, axes)?;
        let mut locations = Vec::with_capacity(sinks.len());
        for sink in sinks {
            locations.push(sink.persist(&set)?);
        }
        Ok((set, locations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use crate::storage::{JsonFileSink, StorageError};

    fn axes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_percentile_branch_end_to_end() {
        let mut residuals = vec![-1.0];
        residuals.extend(std::iter::repeat(2.0).take(20));
        residuals.push(10.0);

        let calibrator = ThresholdCalibrator::default();
        let dwell = calibrator.dwell(1.0);
        let result = calibrator.analyze_axis(&ResidualSeries::new(residuals), &dwell);
        let th = &result.threshold;

        assert_eq!(th.min_c, 2.0);
        assert!((th.max_c - 8.4).abs() < 1e-9);
        assert_eq!(th.method(), "trim_top=0.0");
        assert_eq!(result.alert_runs, vec![21]);
        assert_eq!(result.error_runs, vec![1]);
        // alert: max(10, ceil(q0.9 of [21])) ; error: max(3, ceil(q0.5 of [1]))
        assert_eq!(th.t_long_steps, 21);
        assert_eq!(th.t_short_steps, 3);
        assert_eq!(th.dt_seconds, 1.0);
    }

    #[test]
    fn test_degenerate_axis() {
        let calibrator = ThresholdCalibrator::default();
        let dwell = calibrator.dwell(0.5);
        let series = ResidualSeries::new(vec![-0.3, 0.0, -2.0, f64::NAN]);
        let result = calibrator.analyze_axis(&series, &dwell);

        assert_eq!(result.threshold.min_c, 0.0);
        assert_eq!(result.threshold.max_c, 0.0);
        assert_eq!(result.method, EstimateMethod::Degenerate);
        assert_eq!(result.threshold.method(), "degenerate");
        assert!(result.alert_runs.is_empty());
        assert!(result.error_runs.is_empty());
        assert_eq!(result.threshold.t_long_steps, 20);
        assert_eq!(result.threshold.t_short_steps, 6);
    }

    #[test]
    fn test_masks_cover_full_series() {
        // 3 positives -> median+MAD: med 1, MAD 0 -> MinC = MaxC = 1
        let calibrator = ThresholdCalibrator::default();
        let dwell = calibrator.dwell(1.0);
        let series = ResidualSeries::new(vec![1.0, 1.0, -5.0, 1.0, f64::INFINITY]);
        let result = calibrator.analyze_axis(&series, &dwell);
        assert_eq!(result.threshold.method(), "median+MAD");
        assert_eq!(result.threshold.min_c, 1.0);
        assert_eq!(result.alert_runs, vec![2, 2]);
        assert_eq!(result.error_runs, vec![2, 2]);
    }

    #[test]
    fn test_missing_axis_fails_whole_run() {
        let source = InMemorySource::new(1.0).with_axis("a", vec![1.0, 2.0]);
        let err = ThresholdCalibrator::default()
            .calibrate(&source, &axes(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, CalibrationError::MissingAxis(ref a) if a == "b"));
    }

    #[test]
    fn test_empty_series_fails() {
        let source = InMemorySource::new(1.0).with_axis("a", Vec::new());
        let err = ThresholdCalibrator::default()
            .calibrate(&source, &axes(&["a"]))
            .unwrap_err();
        assert!(matches!(err, CalibrationError::EmptySeries(_)));
    }

    #[test]
    fn test_no_axes_requested() {
        let source = InMemorySource::new(1.0);
        let err = ThresholdCalibrator::default().calibrate(&source, &[]).unwrap_err();
        assert!(matches!(err, CalibrationError::NoAxes));
    }

    #[test]
    fn test_invalid_params_rejected_up_front() {
        let params = ThresholdPolicy {
            min_pos_for_trim: 0,
            ..Default::default()
        };
        assert!(matches!(
            ThresholdCalibrator::from_params(params),
            Err(CalibrationError::Configuration(_))
        ));
    }

    #[test]
    fn test_axes_independent() {
        let a: Vec<f64> = (0..40).map(|i| f64::from(i % 9) - 2.0).collect();
        let b: Vec<f64> = (0..40).map(|i| f64::from(i % 4) * 0.5).collect();
        let calibrator = ThresholdCalibrator::default();

        let both = InMemorySource::new(0.5)
            .with_axis("a", a.clone())
            .with_axis("b", b);
        let only_a = InMemorySource::new(0.5).with_axis("a", a);

        let set_both = calibrator.calibrate(&both, &axes(&["a", "b"])).unwrap();
        let set_a = calibrator.calibrate(&only_a, &axes(&["a"])).unwrap();
        assert_eq!(set_both.get("a"), set_a.get("a"));
        assert_eq!(set_both.len(), 2);
    }

    struct RejectingSink;

    impl ThresholdSink for RejectingSink {
        fn persist(&self, _set: &ThresholdSet) -> Result<PathBuf, StorageError> {
            Err(StorageError::VersionNotFound("v1".to_string()))
        }
    }

    #[test]
    fn test_sinks_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = JsonFileSink::new(dir.path().join("a"));
        let second = JsonFileSink::new(dir.path().join("b"));
        let source = InMemorySource::new(1.0).with_axis("a", vec![1.0, 2.0]);

        let (set, locations) = ThresholdCalibrator::default()
            .calibrate_and_persist(&source, &axes(&["a"]), &[&first, &second])
            .unwrap();
        assert_eq!(locations, vec![first.path(), second.path()]);
        assert_eq!(second.load().unwrap(), set);
    }

    #[test]
    fn test_failed_sink_stops_later_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let json = JsonFileSink::new(dir.path());
        let source = InMemorySource::new(1.0).with_axis("a", vec![1.0, 2.0]);

        let err = ThresholdCalibrator::default()
            .calibrate_and_persist(&source, &axes(&["a"]), &[&RejectingSink, &json])
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Persistence(_)));
        assert!(!json.path().exists());
    }
}
