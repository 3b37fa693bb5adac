//! Calibrated per-axis thresholds and the persisted threshold set
//!
//! The serialized shape of [`ThresholdSet`] is the contract with downstream
//! alerting consumers:
//!
//! ```json
//! {
//!   "axis1": {
//!     "MinC": 2.0,
//!     "MaxC": 8.4,
//!     "T_long_steps": 21,
//!     "T_short_steps": 3,
//!     "dt_seconds": 1.0,
//!     "meta": { "method": "trim_top=0.0" }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Estimation Method
// ============================================================================

/// Which estimator branch produced an axis' MinC/MaxC.
///
/// Diagnostic only. It is rendered into `meta.method` and never consulted for
/// control flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimateMethod {
    /// No strictly positive residuals; both bounds are zero.
    Degenerate,
    /// Too few positive residuals; median + k·MAD fallback.
    MedianMad,
    /// Linear-interpolation percentiles after discarding the top `ratio` fraction.
    Percentile { trim_top_ratio: f64 },
}

impl EstimateMethod {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, EstimateMethod::Degenerate)
    }
}

impl std::fmt::Display for EstimateMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimateMethod::Degenerate => write!(f, "degenerate"),
            EstimateMethod::MedianMad => write!(f, "median+MAD"),
            EstimateMethod::Percentile { trim_top_ratio } => {
                write!(f, "trim_top={}", fmt_ratio(*trim_top_ratio))
            }
        }
    }
}

/// Shortest round-trip decimal, always with a fractional part (`0.0`,
/// `0.05`). Scientific exponents carry a sign and at least two digits
/// (`1e-05`).
fn fmt_ratio(ratio: f64) -> String {
    let text = format!("{ratio:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

// ============================================================================
// Axis Threshold
// ============================================================================

/// Free-form diagnostics attached to an [`AxisThreshold`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdMeta {
    pub method: String,
}

/// Calibrated thresholds for one monitored axis.
///
/// Computed once and never mutated. `min_c <= max_c` holds for every
/// estimator branch given percentiles `minc <= maxc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisThreshold {
    /// Alert-level residual magnitude.
    #[serde(rename = "MinC")]
    pub min_c: f64,

    /// Error-level residual magnitude.
    #[serde(rename = "MaxC")]
    pub max_c: f64,

    /// Consecutive samples at or above MinC before an alert is genuine.
    #[serde(rename = "T_long_steps")]
    pub t_long_steps: u64,

    /// Consecutive samples at or above MaxC before an error is genuine.
    #[serde(rename = "T_short_steps")]
    pub t_short_steps: u64,

    /// Representative sampling interval, clamped away from zero.
    pub dt_seconds: f64,

    pub meta: ThresholdMeta,
}

impl AxisThreshold {
    pub fn method(&self) -> &str {
        &self.meta.method
    }
}

// ============================================================================
// Threshold Set
// ============================================================================

/// All calibrated axes of one run, keyed by axis name.
///
/// Ordered map so the serialized document is byte-identical for identical
/// inputs, whatever order the per-axis workers finished in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdSet {
    axes: BTreeMap<String, AxisThreshold>,
}

impl ThresholdSet {
    pub fn get(&self, axis: &str) -> Option<&AxisThreshold> {
        self.axes.get(axis)
    }

    pub fn contains(&self, axis: &str) -> bool {
        self.axes.contains_key(axis)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Axis names in sorted order.
    pub fn axes(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AxisThreshold)> {
        self.axes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<(String, AxisThreshold)> for ThresholdSet {
    fn from_iter<I: IntoIterator<Item = (String, AxisThreshold)>>(iter: I) -> Self {
        Self {
            axes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ThresholdSet {
    type Item = (&'a String, &'a AxisThreshold);
    type IntoIter = std::collections::btree_map::Iter<'a, String, AxisThreshold>;

    fn into_iter(self) -> Self::IntoIter {
        self.axes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(min_c: f64, max_c: f64) -> AxisThreshold {
        AxisThreshold {
            min_c,
            max_c,
            t_long_steps: 20,
            t_short_steps: 6,
            dt_seconds: 0.5,
            meta: ThresholdMeta {
                method: EstimateMethod::Percentile { trim_top_ratio: 0.02 }.to_string(),
            },
        }
    }

    #[test]
    fn test_method_tags() {
        assert_eq!(EstimateMethod::Degenerate.to_string(), "degenerate");
        assert_eq!(EstimateMethod::MedianMad.to_string(), "median+MAD");
        assert_eq!(
            EstimateMethod::Percentile { trim_top_ratio: 0.02 }.to_string(),
            "trim_top=0.02"
        );
        assert_eq!(
            EstimateMethod::Percentile { trim_top_ratio: 0.0 }.to_string(),
            "trim_top=0.0"
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let set: ThresholdSet = [("axis1".to_string(), sample(1.5, 3.25))]
            .into_iter()
            .collect();
        let value: serde_json::Value = serde_json::to_value(&set).unwrap();
        let axis = &value["axis1"];

        let mut keys: Vec<&str> = axis
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["MaxC", "MinC", "T_long_steps", "T_short_steps", "dt_seconds", "meta"]
        );
        assert_eq!(axis["meta"]["method"], "trim_top=0.02");
        assert_eq!(axis["T_long_steps"], 20);
    }

    #[test]
    fn test_threshold_set_roundtrips_through_json() {
        let set: ThresholdSet = [
            ("b".to_string(), sample(1.0, 2.0)),
            ("a".to_string(), sample(0.5, 0.75)),
        ]
        .into_iter()
        .collect();
        let json = set.to_json_pretty().unwrap();
        let back: ThresholdSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert_eq!(back.axes().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_small_ratio_tag_uses_two_digit_exponent() {
        let tag = |trim_top_ratio| EstimateMethod::Percentile { trim_top_ratio }.to_string();
        assert_eq!(tag(0.0001), "trim_top=0.0001");
        assert_eq!(tag(1e-5), "trim_top=1e-05");
        assert_eq!(tag(2.5e-7), "trim_top=2.5e-07");
    }
}
