//! End-to-end run: load, impute, derive, explore, forecast.
//!
//! Stages run sequentially and the first error aborts the run.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{info, warn};

use crate::analysis::{explore, write_decomposition_csv, Exploration};
use crate::config::Config;
use crate::data::{derive, impute_table, DerivedSeries, Loader, BALANCE};
use crate::domain::{EnergyTable, ForecastResult, Measurement, MonthlySeries, YearMonth};
use crate::error::Result;
use crate::forecast::{AutoArima, Forecaster, HoltWinters, HoltWintersVariant};
use crate::ml::Nnar;

/// One forecaster run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRun {
    /// Which pipeline step produced this run, e.g. `holt_winters`
    pub step: String,
    /// Marks the configured final Holt-Winters variant
    pub chosen: bool,
    pub result: ForecastResult,
}

/// Missing values filled per raw column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputationSummary {
    pub column: Measurement,
    pub filled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub start: YearMonth,
    pub observations: usize,
    pub imputation: Vec<ImputationSummary>,
    pub derived: DerivedSeries,
    pub exploration: Exploration,
    pub runs: Vec<ModelRun>,
}

impl PipelineReport {
    pub fn runs_for(&self, step: &str) -> impl Iterator<Item = &ModelRun> {
        let step = step.to_string();
        self.runs.iter().filter(move |r| r.step == step)
    }
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured data file and run every stage
    pub fn run(&self) -> Result<PipelineReport> {
        let table = Loader::new(&self.config.data).load_from_path(&self.config.data.path)?;
        self.run_table(&table)
    }

    pub fn run_table(&self, table: &EnergyTable) -> Result<PipelineReport> {
        let imputation = Measurement::iter()
            .map(|column| ImputationSummary {
                column,
                filled: table.missing_count(column),
            })
            .collect();
        let imputed = impute_table(table)?;
        let derived = derive(&imputed);
        info!(
            start = %derived.total_production.start,
            observations = derived.total_production.len(),
            "derived total production and balance"
        );

        let exploration = explore(&derived.total_production)?;
        if let Some(path) = &self.config.output.decomposition_csv {
            write_decomposition_csv(&derived.total_production, &exploration.decomposition, path)?;
        }

        let runs = self.forecast_all(&derived)?;

        let report = PipelineReport {
            start: table.start(),
            observations: table.len(),
            imputation,
            derived,
            exploration,
            runs,
        };
        if let Some(path) = &self.config.output.json {
            std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
            info!(path = %path.display(), "wrote forecast report");
        }
        Ok(report)
    }

    fn forecast_all(&self, derived: &DerivedSeries) -> Result<Vec<ModelRun>> {
        let cfg = &self.config;
        let total = &derived.total_production;
        let mut runs = Vec::new();

        let mut arima = AutoArima::new(cfg.arima.clone());
        runs.push(self.run_model("auto_arima", &mut arima, total, false)?);

        for variant in HoltWintersVariant::iter() {
            let mut hw = HoltWinters::new(variant);
            let chosen = variant == cfg.holt_winters.final_variant;
            runs.push(self.run_model("holt_winters", &mut hw, total, chosen)?);
        }

        let mut nnar = Nnar::new(cfg.nnar.clone()).with_regressor(
            BALANCE,
            derived.balance.values.clone(),
            cfg.nnar.regressor_future.clone(),
        );
        runs.push(self.run_model("nnar", &mut nnar, total, false)?);

        let mut balance_arima = AutoArima::new(cfg.arima.clone());
        runs.push(self.run_model("auto_arima", &mut balance_arima, &derived.balance, false)?);

        Ok(runs)
    }

    fn run_model(
        &self,
        step: &str,
        model: &mut dyn Forecaster,
        series: &MonthlySeries,
        chosen: bool,
    ) -> Result<ModelRun> {
        info!(step, model = %model.name(), series = %series.name, "fitting");
        model.fit(series)?;
        let result = model.forecast(self.config.forecast.horizon, &self.config.forecast.levels)?;
        match &result.accuracy {
            Some(acc) if !acc.is_reliable() => {
                warn!(model = %result.model, quality = ?acc.quality(), mape = acc.mape, "in-sample fit is weak")
            }
            _ => {}
        }
        info!(step, model = %result.model, series = %series.name, rows = result.len(), "forecast ready");
        Ok(ModelRun {
            step: step.to_string(),
            chosen,
            result,
        })
    }
}
