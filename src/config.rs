use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::forecast::{HoltWintersVariant, InformationCriterion};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "SOLAR__";

/// Operator-supplied 12-month balance forecast fed to the NNAR model as its
/// future exogenous regressor
pub const DEFAULT_BALANCE_FORECAST: [f64; 12] = [
    -964.29, -588.84, 213.32, 638.36, 923.74, 789.57, 698.11, 361.37, -363.04, -827.66,
    -1507.65, -1375.54,
];

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct Config {
    #[validate(nested)]
    pub data: DataConfig,
    #[validate(nested)]
    pub forecast: ForecastConfig,
    #[validate(nested)]
    pub arima: ArimaConfig,
    #[validate(nested)]
    pub holt_winters: HoltWintersConfig,
    #[validate(nested)]
    pub nnar: NnarConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataConfig {
    pub path: PathBuf,
    pub delimiter: char,
    #[validate(length(min = 1))]
    pub date_column: String,
    #[validate(length(min = 1))]
    pub date_format: String,
    #[validate(length(min = 1))]
    pub inverter_1_column: String,
    #[validate(length(min = 1))]
    pub inverter_2_column: String,
    #[validate(length(min = 1))]
    pub bought_column: String,
    #[validate(length(min = 1))]
    pub sold_column: String,
    /// Cell values treated as missing (compared case-insensitively)
    pub na_tokens: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/energy.csv"),
            delimiter: ';',
            date_column: "Data".into(),
            date_format: "%Y-%m-%d".into(),
            inverter_1_column: "Produkcja1".into(),
            inverter_2_column: "Produkcja2".into(),
            bought_column: "Zakup".into(),
            sold_column: "Sprzedaz".into(),
            na_tokens: vec!["".into(), "NA".into(), "NaN".into(), "null".into()],
        }
    }
}

impl DataConfig {
    pub fn delimiter_byte(&self) -> Result<u8> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character, got '{}'", self.delimiter);
        }
        Ok(self.delimiter as u8)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForecastConfig {
    #[validate(range(min = 1, max = 120))]
    pub horizon: usize,
    /// Prediction interval levels in percent
    #[validate(length(min = 1))]
    pub levels: Vec<f64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            levels: vec![80.0, 95.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ArimaConfig {
    #[validate(range(max = 5))]
    pub max_p: usize,
    #[validate(range(max = 5))]
    pub max_q: usize,
    #[validate(range(max = 2))]
    pub max_seasonal_p: usize,
    #[validate(range(max = 2))]
    pub max_seasonal_q: usize,
    /// Upper bound on p + q + P + Q
    #[validate(range(max = 10))]
    pub max_order: usize,
    #[validate(range(max = 2))]
    pub max_d: usize,
    #[validate(range(max = 1))]
    pub max_seasonal_d: usize,
    pub criterion: InformationCriterion,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_q: 5,
            max_seasonal_p: 2,
            max_seasonal_q: 2,
            max_order: 5,
            max_d: 2,
            max_seasonal_d: 1,
            criterion: InformationCriterion::Aicc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HoltWintersConfig {
    /// Variant reported as the final Holt-Winters model
    pub final_variant: HoltWintersVariant,
}

impl Default for HoltWintersConfig {
    fn default() -> Self {
        Self {
            final_variant: HoltWintersVariant::DampedMultiplicative,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NnarConfig {
    #[validate(range(min = 1, max = 500))]
    pub repeats: usize,
    /// Non-seasonal lags; chosen from an AR fit when unset
    #[validate(range(min = 1, max = 24))]
    pub lags: Option<usize>,
    /// Hidden units; `round((p + P + n_xreg + 1) / 2)` when unset
    #[validate(range(min = 1, max = 64))]
    pub hidden: Option<usize>,
    #[validate(range(min = 1, max = 100000))]
    pub epochs: usize,
    #[validate(range(min = 0.0001, max = 1.0))]
    pub learning_rate: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub decay: f64,
    #[validate(range(min = 10, max = 100000))]
    pub simulation_paths: usize,
    pub seed: u64,
    /// Future regressor values, exactly one per forecast step
    pub regressor_future: Vec<f64>,
}

impl Default for NnarConfig {
    fn default() -> Self {
        Self {
            repeats: 20,
            lags: None,
            hidden: None,
            epochs: 1000,
            learning_rate: 0.1,
            decay: 0.001,
            simulation_paths: 500,
            seed: 42,
            regressor_future: DEFAULT_BALANCE_FORECAST.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Write all forecast results as JSON
    pub json: Option<PathBuf>,
    /// Write the STL decomposition of total production as CSV
    pub decomposition_csv: Option<PathBuf>,
}

impl Config {
    /// Defaults, then `config/default.toml` if present, then `SOLAR__*` env vars
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file(DEFAULT_CONFIG_PATH))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Like [`load`](Self::load) but with an explicit TOML file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Field-level validation plus the cross-field rules derive can't express
    pub fn check(&self) -> Result<()> {
        self.validate().context("configuration validation failed")?;
        self.data.delimiter_byte()?;
        if let Some(bad) = self
            .forecast
            .levels
            .iter()
            .find(|l| !(**l > 0.0 && **l < 100.0))
        {
            bail!("forecast.levels must lie strictly between 0 and 100, got {bad}");
        }
        let supplied = self.nnar.regressor_future.len();
        if supplied != self.forecast.horizon {
            bail!(
                "nnar.regressor_future has {supplied} values but forecast.horizon is {}",
                self.forecast.horizon
            );
        }
        Ok(())
    }
}
