//! Config validation: unknown-key detection with Levenshtein suggestions
//! and suspicious-value checks.
//!
//! Two-pass parse: the raw TOML is first read into a `toml::Value`, its key
//! tree walked and compared against known field names, then the normal serde
//! deserialization runs. Warnings never break a config that deserializes.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `CalibConfig`.
///
/// Must be kept in step with the structs in calib_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [run]
        "run",
        "run.name",
        "run.version_tag",
        // [input]
        "input",
        "input.residuals_csv",
        "input.time_col",
        "input.residual_suffix",
        "input.axes",
        // [thresholds]
        "thresholds",
        "thresholds.minc_percentile",
        "thresholds.maxc_percentile",
        "thresholds.trim_top_ratio",
        "thresholds.min_pos_for_trim",
        "thresholds.use_mad_fallback",
        "thresholds.alert_seconds_default",
        "thresholds.error_seconds_default",
        "thresholds.alert_quantile",
        "thresholds.error_quantile",
        // [output]
        "output",
        "output.out_dir",
        "output.registry_dir",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively collect the dotted key paths of a `toml::Value` tree.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3. Ties go to the alphabetically
/// first key so the suggestion is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Warnings for every key in `raw_toml` that `CalibConfig` does not know.
///
/// Unparsable TOML yields no warnings; serde reports the parse error.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Suspicious Values
// ============================================================================

/// Values that form a valid policy but probably are not what was meant.
pub fn validate_suspicious_values(config: &super::CalibConfig) -> Vec<ValidationWarning> {
    let t = &config.thresholds;
    let mut warnings = Vec::new();

    if t.trim_top_ratio >= 0.5 {
        warnings.push(ValidationWarning {
            field: "thresholds.trim_top_ratio".to_string(),
            message: format!(
                "trim_top_ratio = {} drops at least half of the positive residuals",
                t.trim_top_ratio
            ),
            suggestion: None,
        });
    }

    if t.alert_seconds_default < t.error_seconds_default {
        warnings.push(ValidationWarning {
            field: "thresholds.alert_seconds_default".to_string(),
            message: format!(
                "alert_seconds_default = {} is shorter than error_seconds_default = {}",
                t.alert_seconds_default, t.error_seconds_default
            ),
            suggestion: None,
        });
    }

    if !t.use_mad_fallback && t.min_pos_for_trim > 1 {
        warnings.push(ValidationWarning {
            field: "thresholds.use_mad_fallback".to_string(),
            message: format!(
                "use_mad_fallback = false: axes with fewer than {} positive residuals use raw percentiles",
                t.min_pos_for_trim
            ),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibConfig;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("quantile", "quantile"), 0);
        assert_eq!(levenshtein("quantle", "quantile"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            top = 1
            [thresholds]
            alert_quantile = 0.9
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"top".to_string()));
        assert!(keys.contains(&"thresholds".to_string()));
        assert!(keys.contains(&"thresholds.alert_quantile".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[thresholds]
minc_percentil = 90.0
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "thresholds.minc_percentil");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("thresholds.minc_percentile")
        );
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let warnings = validate_unknown_keys(
            r#"
[run]
name = "line-3"
version_tag = "v2"

[input]
residuals_csv = "residuals.csv"
axes = ["x", "y"]

[thresholds]
trim_top_ratio = 0.01
use_mad_fallback = false

[output]
out_dir = "out"
registry_dir = "registry"
"#,
        );
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[plots]\nenabled = true\n");
        assert!(warnings.iter().any(|w| w.field == "plots"));
        assert!(warnings.iter().any(|w| w.field == "plots.enabled"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key", &known).is_none());
    }

    #[test]
    fn test_unparsable_toml_yields_no_warnings() {
        assert!(validate_unknown_keys("[[[not toml").is_empty());
    }

    #[test]
    fn test_defaults_not_suspicious() {
        assert!(validate_suspicious_values(&CalibConfig::default()).is_empty());
    }

    #[test]
    fn test_suspicious_values_flagged() {
        let mut config = CalibConfig::default();
        config.thresholds.trim_top_ratio = 0.6;
        config.thresholds.alert_seconds_default = 1.0;
        let fields: Vec<String> = validate_suspicious_values(&config)
            .into_iter()
            .map(|w| w.field)
            .collect();
        assert!(fields.contains(&"thresholds.trim_top_ratio".to_string()));
        assert!(fields.contains(&"thresholds.alert_seconds_default".to_string()));
    }
}
