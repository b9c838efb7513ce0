use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use solar_forecast::{config, pipeline, report, telemetry};
use config::Config;
use pipeline::Pipeline;
use telemetry::init_tracing;
use tracing::info;

/// Monthly solar production and energy balance forecasts
#[derive(Debug, Parser)]
#[command(name = "solar-forecast", version, about)]
struct Cli {
    /// TOML configuration file (defaults to config/default.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV, overrides `data.path`
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Write the full report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the STL decomposition of total production as CSV
    #[arg(long)]
    decomposition_csv: Option<PathBuf>,

    /// Forecast horizon in months; `nnar.regressor_future` must match it
    #[arg(long)]
    horizon: Option<usize>,
}

impl Cli {
    fn apply(self, cfg: &mut Config) {
        if let Some(path) = self.data {
            cfg.data.path = path;
        }
        if let Some(path) = self.json {
            cfg.output.json = Some(path);
        }
        if let Some(path) = self.decomposition_csv {
            cfg.output.decomposition_csv = Some(path);
        }
        if let Some(h) = self.horizon {
            cfg.forecast.horizon = h;
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply(&mut cfg);
    cfg.check()?;

    info!(data = %cfg.data.path.display(), horizon = cfg.forecast.horizon, "starting solar forecast");

    let pipeline = Pipeline::new(cfg);
    let report = pipeline
        .run()
        .with_context(|| format!("forecast run on {} failed", pipeline.config().data.path.display()))?;

    print!("{}", report::render(&report));
    Ok(())
}
