//! dc-flex entry point: CLI wiring and config-driven pipeline construction.

mod cli;

use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;

use dc_flex::config::AnalysisConfig;
use dc_flex::io::export::{
    export_decomposition, export_hourly_events, export_reliability, export_simulation,
};
use dc_flex::io::import::{load_prices, load_samples};
use dc_flex::pipeline::{Pipeline, PipelineOutput};
use dc_flex::profile::extend_series;
use dc_flex::telemetry::init_tracing;

use crate::cli::Args;

fn load_config(args: &Args) -> anyhow::Result<AnalysisConfig> {
    let config = if let Some(path) = &args.config {
        AnalysisConfig::from_toml_file(path)?
    } else if let Some(name) = &args.preset {
        AnalysisConfig::from_preset(name)?
    } else {
        AnalysisConfig::baseline()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("configuration has {} error(s)", errors.len());
    }
    Ok(config)
}

fn write_tables(output: &PipelineOutput, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join("decomposition.csv");
    export_decomposition(&output.decomposition.rows, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    let path = dir.join("dr_simulation.csv");
    export_simulation(&output.potentials, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    let path = dir.join("dr_events_1h.csv");
    export_hourly_events(&output.hourly, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    let path = dir.join("reliability_metrics.csv");
    export_reliability(&output.reliability, &path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(dir = %dir.display(), "tables written");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);

    let config = load_config(&args)?;

    let mut samples = load_samples(&args.load)
        .with_context(|| format!("failed to read load series {}", args.load.display()))?;
    info!(samples = samples.len(), "load series read");

    if let Some(date) = args.extend_to {
        let Some(end) = date.and_hms_opt(23, 45, 0) else {
            bail!("invalid extension date {date}");
        };
        samples = extend_series(&samples, end, &config.synthetic)
            .context("failed to extend load series")?;
    }

    let prices = match &args.prices {
        Some(path) => Some(
            load_prices(path)
                .with_context(|| format!("failed to read price series {}", path.display()))?,
        ),
        None => None,
    };

    let output = Pipeline::new(config)
        .run(&samples, prices.as_deref())
        .context("analysis failed")?;

    println!("{output}");

    if let Some(dir) = &args.out_dir {
        write_tables(&output, dir)?;
    }
    Ok(())
}
