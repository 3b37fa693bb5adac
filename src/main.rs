//! axis-thresholds - residual threshold calibration CLI
//!
//! Reads the residual CSV written by the model-fitting stage, calibrates
//! MinC/MaxC and dwell steps per axis, and writes `thresholds.json` (plus a
//! registry version when a registry directory is configured).
//!
//! # Usage
//!
//! ```bash
//! # Calibrate every *_res column with ./calibration.toml (or defaults)
//! axis-thresholds --residuals out/residuals.csv
//!
//! # Two axes only, print the set without writing anything
//! axis-thresholds --residuals out/residuals.csv --axes x,y --dry-run
//!
//! # Also store a registry version
//! axis-thresholds --registry-dir registry --version-tag 2024-06-01
//! ```
//!
//! # Environment Variables
//!
//! - `AXIS_THRESHOLDS_CONFIG`: config file used when `--config` is absent
//! - `AXIS_THRESHOLDS_REGISTRY`: registry root (same as `--registry-dir`)
//! - `RUST_LOG`: logging level (default: info, `--log-json` for JSON lines)

use anyhow::{Context, Result};
use axis_thresholds::config::CalibConfig;
use axis_thresholds::metrics;
use axis_thresholds::source::{CsvResidualSource, ResidualSource};
use axis_thresholds::storage::{
    JsonFileSink, ModelRegistry, RegistryMeta, RegistrySink, ThresholdSink,
};
use axis_thresholds::ThresholdCalibrator;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rows printed in the closing summary.
const SUMMARY_ROWS: usize = 8;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "axis-thresholds")]
#[command(about = "Calibrate per-axis residual thresholds and dwell times")]
#[command(version)]
struct CliArgs {
    /// Config file (default: $AXIS_THRESHOLDS_CONFIG, then ./calibration.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Residual CSV (overrides input.residuals_csv)
    #[arg(long, value_name = "FILE")]
    residuals: Option<PathBuf>,

    /// Comma-separated axes to calibrate (overrides input.axes)
    #[arg(long, value_delimiter = ',')]
    axes: Vec<String>,

    /// Directory for thresholds.json (overrides output.out_dir)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Registry root (overrides output.registry_dir)
    #[arg(long, value_name = "DIR", env = "AXIS_THRESHOLDS_REGISTRY")]
    registry_dir: Option<PathBuf>,

    /// Registry version tag (overrides run.version_tag)
    #[arg(long)]
    version_tag: Option<String>,

    /// Print the calibrated set as JSON instead of writing it
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl CliArgs {
    fn apply(self, config: &mut CalibConfig) {
        if let Some(path) = self.residuals {
            config.input.residuals_csv = path;
        }
        if !self.axes.is_empty() {
            config.input.axes = self.axes;
        }
        if let Some(dir) = self.out_dir {
            config.output.out_dir = dir;
        }
        if let Some(dir) = self.registry_dir {
            config.output.registry_dir = Some(dir);
        }
        if let Some(tag) = self.version_tag {
            config.run.version_tag = tag;
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);
    let dry_run = args.dry_run;

    let mut config = match &args.config {
        Some(path) => CalibConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CalibConfig::load().context("Failed to load configuration")?,
    };
    args.apply(&mut config);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    let calibrator = ThresholdCalibrator::from_params(config.thresholds.clone())?;

    let csv_path = &config.input.residuals_csv;
    let source = CsvResidualSource::load(csv_path, &config.input)
        .with_context(|| format!("Failed to read residuals from {}", csv_path.display()))?;

    let axes = if config.input.axes.is_empty() {
        source.axes().to_vec()
    } else {
        config.input.axes.clone()
    };
    if axes.is_empty() {
        anyhow::bail!(
            "No '*{}' residual columns found in {}",
            config.input.residual_suffix,
            csv_path.display()
        );
    }

    info!(
        run = %config.run.name,
        axes = axes.len(),
        rows = source.profile().n_rows,
        "Starting threshold calibration"
    );

    if dry_run {
        let set = calibrator.calibrate(&source, &axes)?;
        println!("{}", set.to_json_pretty()?);
        return Ok(());
    }

    let registry = config.output.registry_dir.as_ref().map(ModelRegistry::new);
    let fit = match &registry {
        Some(_) => metrics::evaluate(&source, &axes),
        None => Vec::new(),
    };
    let meta = RegistryMeta {
        run_name: config.run.name.clone(),
        axes: axes.clone(),
        dt_seconds: source.dt_seconds(),
        policy: config.thresholds.clone(),
        source: Some(csv_path.display().to_string()),
        saved_at: None,
    };
    let registry_sink = registry
        .as_ref()
        .map(|r| RegistrySink::new(r, &config.run.version_tag, &fit, &meta));
    let json_sink = JsonFileSink::new(&config.output.out_dir);

    // Registry first: a failed version save leaves thresholds.json untouched
    let mut sinks: Vec<&dyn ThresholdSink> = Vec::new();
    if let Some(sink) = &registry_sink {
        sinks.push(sink);
    }
    sinks.push(&json_sink);

    let (set, locations) = calibrator
        .calibrate_and_persist(&source, &axes, &sinks)
        .context("Threshold calibration failed")?;

    for location in &locations {
        println!("Saved: {}", location.display());
    }
    for (axis, th) in set.iter().take(SUMMARY_ROWS) {
        println!(
            "  {axis:<16} MinC={:.6} MaxC={:.6} T_long={} T_short={} ({})",
            th.min_c, th.max_c, th.t_long_steps, th.t_short_steps, th.meta.method
        );
    }
    if set.len() > SUMMARY_ROWS {
        println!("  ... {} more axes", set.len() - SUMMARY_ROWS);
    }

    Ok(())
}

