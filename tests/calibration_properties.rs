//! Calibration Property Tests
//!
//! Behavioural guarantees of the calibration core, driven through the public
//! API with in-memory residual sources.

use axis_thresholds::calibration::stats::{median_mad, percentile_sorted, sorted};
use axis_thresholds::calibration::{run_lengths, steps_from_seconds, RunLengths};
use axis_thresholds::config::ThresholdPolicy;
use axis_thresholds::{InMemorySource, ResidualSeries, ThresholdCalibrator, ThresholdSet};

fn axes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Deterministic pseudo-residuals: a slow wave with periodic spikes.
fn wave(n: usize, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64 * 0.37 + phase;
            let spike = if i % 23 == 0 { 3.0 } else { 0.0 };
            x.sin() * 1.5 + spike - 0.2
        })
        .collect()
}

fn calibrate(source: &InMemorySource, names: &[&str]) -> ThresholdSet {
    ThresholdCalibrator::default()
        .calibrate(source, &axes(names))
        .unwrap()
}

// ============================================================================
// Magnitude Estimation
// ============================================================================

#[test]
fn percentile_branch_matches_exact_percentiles() {
    let residuals = wave(400, 0.0);
    let source = InMemorySource::new(0.1).with_axis("spindle", residuals.clone());
    let th = calibrate(&source, &["spindle"]).get("spindle").cloned().unwrap();

    let positive: Vec<f64> = residuals.into_iter().filter(|r| *r > 0.0).collect();
    assert!(positive.len() >= 20);
    let pos = sorted(&positive);
    assert_eq!(th.min_c, percentile_sorted(&pos, 95.0).unwrap());
    assert_eq!(th.max_c, percentile_sorted(&pos, 99.0).unwrap());
    assert_eq!(th.method(), "trim_top=0.0");
}

#[test]
fn small_samples_use_median_mad() {
    let residuals = vec![-1.0, 0.5, 1.0, -2.0, 4.0, 1.5, 0.0];
    let source = InMemorySource::new(1.0).with_axis("x", residuals);
    let th = calibrate(&source, &["x"]).get("x").cloned().unwrap();

    let (med, mad) = median_mad(&[0.5, 1.0, 4.0, 1.5]).unwrap();
    assert!((th.min_c - (med + 2.0 * mad)).abs() < 1e-12);
    assert!((th.max_c - (med + 3.0 * mad)).abs() < 1e-12);
    assert!(th.min_c <= th.max_c);
    assert_eq!(th.method(), "median+MAD");
}

#[test]
fn disabled_fallback_uses_percentiles_for_small_samples() {
    let params = ThresholdPolicy {
        use_mad_fallback: false,
        ..Default::default()
    };
    let calibrator = ThresholdCalibrator::from_params(params).unwrap();
    let source = InMemorySource::new(1.0).with_axis("x", vec![1.0, 2.0, 3.0]);
    let set = calibrator.calibrate(&source, &axes(&["x"])).unwrap();
    let th = set.get("x").unwrap();
    assert!((th.min_c - 2.9).abs() < 1e-12);
    assert!((th.max_c - 2.98).abs() < 1e-12);
}

#[test]
fn trimming_drops_largest_outliers() {
    let mut residuals: Vec<f64> = (1..=100).map(f64::from).collect();
    residuals.push(1e6);
    let params = ThresholdPolicy {
        trim_top_ratio: 0.05,
        ..Default::default()
    };
    let calibrator = ThresholdCalibrator::from_params(params).unwrap();
    let source = InMemorySource::new(1.0).with_axis("x", residuals);
    let set = calibrator.calibrate(&source, &axes(&["x"])).unwrap();
    let th = set.get("x").unwrap();

    // floor(101 * 0.95) = 95 kept: 1..=95
    assert!((th.max_c - 94.06).abs() < 1e-9);
    assert_eq!(th.method(), "trim_top=0.05");
}

#[test]
fn non_finite_residuals_are_not_positive() {
    let clean = vec![0.5, 1.0, 2.0, -1.0];
    let mut dirty = clean.clone();
    dirty.extend([f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);

    let source = InMemorySource::new(1.0)
        .with_axis("clean", clean)
        .with_axis("dirty", dirty);
    let set = calibrate(&source, &["clean", "dirty"]);

    let (c, d) = (set.get("clean").unwrap(), set.get("dirty").unwrap());
    assert_eq!(c.min_c, d.min_c);
    assert_eq!(c.max_c, d.max_c);
    assert!(d.min_c.is_finite() && d.max_c.is_finite());
}

// ============================================================================
// Run Lengths
// ============================================================================

#[test]
fn run_length_examples() {
    let (t, f) = (true, false);
    assert_eq!(run_lengths(&[t, t, f, t, t, t, f, f, t]), vec![2, 3, 1]);
    assert!(run_lengths(&[]).is_empty());
    assert!(run_lengths(&[f, f]).is_empty());
}

#[test]
fn lazy_run_lengths_match_batch() {
    let mask: Vec<bool> = wave(1000, 0.3).iter().map(|r| *r >= 0.8).collect();
    let lazy: Vec<usize> = RunLengths::new(mask.iter().copied()).collect();
    assert_eq!(lazy, run_lengths(&mask));
    assert_eq!(lazy.iter().sum::<usize>(), mask.iter().filter(|m| **m).count());
}

// ============================================================================
// Dwell Steps
// ============================================================================

#[test]
fn step_conversion_example() {
    assert_eq!(steps_from_seconds(10.0, 0.5), 20);
}

#[test]
fn dwell_never_below_defaults() {
    for dt in [0.01, 0.1, 0.5, 1.0, 2.5, 30.0] {
        let source = InMemorySource::new(dt)
            .with_axis("a", wave(300, 0.0))
            .with_axis("b", wave(300, 1.7));
        let set = calibrate(&source, &["a", "b"]);
        let alert_floor = steps_from_seconds(10.0, dt);
        let error_floor = steps_from_seconds(3.0, dt);
        for (_, th) in &set {
            assert!(th.t_long_steps >= 1 && th.t_short_steps >= 1);
            assert!(th.t_long_steps >= alert_floor, "dt={dt}");
            assert!(th.t_short_steps >= error_floor, "dt={dt}");
        }
    }
}

#[test]
fn degenerate_sampling_interval_is_clamped() {
    let source = InMemorySource::new(0.0).with_axis("x", vec![1.0, 2.0]);
    let th = calibrate(&source, &["x"]).get("x").cloned().unwrap();
    assert_eq!(th.dt_seconds, 1e-9);
    assert_eq!(th.t_long_steps, 10_000_000_000);
    assert_eq!(th.t_short_steps, 3_000_000_000);
}

// ============================================================================
// Whole-Axis Behaviour
// ============================================================================

#[test]
fn degenerate_axis_gets_zero_thresholds_and_default_dwell() {
    let calibrator = ThresholdCalibrator::default();
    let dwell = calibrator.dwell(0.5);
    let result = calibrator.analyze_axis(&ResidualSeries::new(vec![-1.0, 0.0, -0.25]), &dwell);

    assert_eq!(result.threshold.min_c, 0.0);
    assert_eq!(result.threshold.max_c, 0.0);
    assert_eq!(result.threshold.method(), "degenerate");
    assert!(result.alert_runs.is_empty() && result.error_runs.is_empty());
    assert_eq!(result.threshold.t_long_steps, 20);
    assert_eq!(result.threshold.t_short_steps, 6);
}

#[test]
fn documented_end_to_end_scenario() {
    let mut residuals = vec![-1.0];
    residuals.extend([2.0; 20]);
    residuals.push(10.0);
    let source = InMemorySource::new(1.0).with_axis("axis1", residuals);
    let th = calibrate(&source, &["axis1"]).get("axis1").cloned().unwrap();

    // Sorted positives: twenty 2's then 10; p95 rank 19.0, p99 rank 19.8
    assert_eq!(th.min_c, 2.0);
    assert!((th.max_c - 8.4).abs() < 1e-9);
    assert_eq!(th.method(), "trim_top=0.0");
    assert_eq!(th.t_long_steps, 21);
    assert_eq!(th.t_short_steps, 3);
}

#[test]
fn calibration_is_idempotent() {
    let source = InMemorySource::new(0.25)
        .with_axis("x", wave(500, 0.0))
        .with_axis("y", wave(500, 2.0))
        .with_axis("z", wave(12, 4.0));
    let names = ["z", "x", "y"];

    let first = calibrate(&source, &names).to_json_pretty().unwrap();
    let second = calibrate(&source, &names).to_json_pretty().unwrap();
    assert_eq!(first, second);
}

#[test]
fn axis_order_does_not_change_records() {
    let source = InMemorySource::new(0.25)
        .with_axis("x", wave(200, 0.0))
        .with_axis("y", wave(200, 1.0));
    assert_eq!(calibrate(&source, &["x", "y"]), calibrate(&source, &["y", "x"]));
}

#[test]
fn output_document_schema() {
    let source = InMemorySource::new(0.5).with_axis("x", wave(100, 0.0));
    let json = calibrate(&source, &["x"]).to_json_pretty().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let record = value["x"].as_object().unwrap();
    let mut keys: Vec<&str> = record.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["MaxC", "MinC", "T_long_steps", "T_short_steps", "dt_seconds", "meta"]
    );
    assert!(record["meta"]["method"].is_string());
    assert_eq!(record["dt_seconds"].as_f64(), Some(0.5));
}
