//! CSV residual files
//!
//! Layout written by the fitting stage: one time column, then per axis an
//! optional observed column `<axis>`, a prediction column and a residual
//! column `<axis><suffix>`:
//!
//! ```text
//! time_s,axis1,axis1_pred,axis1_res,axis2,axis2_pred,axis2_res
//! 0.0,10.2,10.0,0.2,3.1,3.0,0.1
//! ```
//!
//! Empty or unparsable cells become NaN; no interpolation is done here.

use super::profile::{parse_time_seconds, SeriesProfile};
use super::{ResidualSource, SourceError};
use crate::config::InputConfig;
use crate::types::ResidualSeries;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // Escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

fn parse_cell(cell: Option<&String>) -> f64 {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Axis names with a residual column, in header order.
pub fn discover_axes(header: &[String], residual_suffix: &str) -> Vec<String> {
    header
        .iter()
        .filter_map(|col| col.trim().strip_suffix(residual_suffix))
        .filter(|axis| !axis.is_empty())
        .map(str::to_string)
        .collect()
}

/// Residuals and observed values loaded from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvResidualSource {
    axes: Vec<String>,
    residuals: HashMap<String, ResidualSeries>,
    observed: HashMap<String, Vec<f64>>,
    profile: SeriesProfile,
}

impl CsvResidualSource {
    pub fn load(path: &Path, input: &InputConfig) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Io(path.to_path_buf(), e))?;
        let source = Self::parse(&contents, input).map_err(|e| match e {
            SourceError::Empty(_) => SourceError::Empty(path.to_path_buf()),
            SourceError::MissingTimeColumn { column, .. } => SourceError::MissingTimeColumn {
                path: path.to_path_buf(),
                column,
            },
            other => other,
        })?;
        info!(
            path = %path.display(),
            rows = source.profile.n_rows,
            axes = source.axes.len(),
            dt_seconds = source.profile.dt_seconds,
            "Loaded residual CSV"
        );
        Ok(source)
    }

    /// Parse CSV text. Error paths carry an empty placeholder path.
    pub fn parse(contents: &str, input: &InputConfig) -> Result<Self, SourceError> {
        // UTF-8 BOM written by some spreadsheet exports
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

        let header: Vec<String> = match lines.next() {
            Some(line) => csv_split(line).into_iter().map(|c| c.trim().to_string()).collect(),
            None => return Err(SourceError::Empty(Default::default())),
        };
        let col_index: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let time_idx = *col_index.get(input.time_col.as_str()).ok_or_else(|| {
            SourceError::MissingTimeColumn {
                path: Default::default(),
                column: input.time_col.clone(),
            }
        })?;

        let axes = discover_axes(&header, &input.residual_suffix);
        let residual_idx: Vec<(String, usize)> = axes
            .iter()
            .filter_map(|a| {
                let col = format!("{a}{}", input.residual_suffix);
                col_index.get(col.as_str()).map(|&i| (a.clone(), i))
            })
            .collect();
        let observed_idx: Vec<(String, usize)> = axes
            .iter()
            .filter_map(|a| col_index.get(a.as_str()).map(|&i| (a.clone(), i)))
            .collect();

        let mut times = Vec::new();
        let mut residual_cols: HashMap<String, Vec<f64>> = HashMap::new();
        let mut observed_cols: HashMap<String, Vec<f64>> = HashMap::new();

        for line in lines {
            let fields = csv_split(line);
            times.push(fields.get(time_idx).map_or(f64::NAN, |c| parse_time_seconds(c)));
            for (axis, idx) in &residual_idx {
                residual_cols
                    .entry(axis.clone())
                    .or_default()
                    .push(parse_cell(fields.get(*idx)));
            }
            for (axis, idx) in &observed_idx {
                observed_cols
                    .entry(axis.clone())
                    .or_default()
                    .push(parse_cell(fields.get(*idx)));
            }
        }

        // Header-only files still expose every axis, with empty series
        let residuals = axes
            .iter()
            .map(|a| {
                let values = residual_cols.remove(a).unwrap_or_default();
                (a.clone(), ResidualSeries::new(values))
            })
            .collect();

        let profile = SeriesProfile::from_times(&times);
        debug!(
            rows = profile.n_rows,
            axes = ?axes,
            with_observed = observed_cols.len(),
            "Parsed residual CSV"
        );

        Ok(Self {
            axes,
            residuals,
            observed: observed_cols,
            profile,
        })
    }

    /// Axes discovered from the header, in header order.
    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    pub fn profile(&self) -> &SeriesProfile {
        &self.profile
    }
}

impl ResidualSource for CsvResidualSource {
    fn dt_seconds(&self) -> f64 {
        self.profile.dt_seconds
    }

    fn residuals(&self, axis: &str) -> Option<&ResidualSeries> {
        self.residuals.get(axis)
    }

    fn observed(&self, axis: &str) -> Option<&[f64]> {
        self.observed.get(axis).map(Vec::as_slice)
    }
}
