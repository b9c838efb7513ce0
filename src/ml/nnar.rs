//! NNAR(p,P,k): an ensemble of feed-forward networks fed with lagged values.
//!
//! Inputs are lags `1..=p`, the seasonal lag `m` when `P = 1`, and the
//! exogenous regressor at the target period when one is attached. Series and
//! regressor are standardised before training. Forecasts are produced
//! recursively, each step feeding the previous prediction back as a lag.

use anofox_forecast::models::arima::ARIMA;
use anofox_forecast::models::Forecaster as Estimator;
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::network::{Network, TrainingConfig, TrainingDataset};
use super::Scaler;
use crate::analysis::Stl;
use crate::config::NnarConfig;
use crate::domain::{ForecastResult, MonthlySeries, YearMonth};
use crate::error::{ForecastError, Result};
use crate::forecast::{assemble, monthly_time_series, not_fitted, Forecaster};

/// Exogenous input with its observed history and operator-supplied future
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regressor {
    pub name: String,
    pub history: Vec<f64>,
    pub future: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NnarStructure {
    pub p: usize,
    pub seasonal_p: usize,
    pub hidden: usize,
    pub period: usize,
}

impl NnarStructure {
    fn lags(&self) -> Vec<usize> {
        let mut lags: Vec<usize> = (1..=self.p).collect();
        if self.seasonal_p > 0 && !lags.contains(&self.period) {
            lags.push(self.period);
        }
        lags
    }

    fn max_lag(&self) -> usize {
        self.lags().into_iter().max().unwrap_or(0)
    }
}

struct NnarFit {
    structure: NnarStructure,
    lags: Vec<usize>,
    y_scaler: Scaler,
    x_scaler: Option<Scaler>,
    nets: Vec<Network>,
    /// Residual standard deviation on the standardised scale
    residual_sd: f64,
}

pub struct Nnar {
    config: NnarConfig,
    regressor: Option<Regressor>,
    fit: Option<NnarFit>,
    history: Option<MonthlySeries>,
    fitted: Vec<f64>,
}

impl Nnar {
    pub fn new(config: NnarConfig) -> Self {
        Self {
            config,
            regressor: None,
            fit: None,
            history: None,
            fitted: Vec::new(),
        }
    }

    /// Attach an exogenous regressor. `history` must align with the series
    /// passed to `fit`; `future` supplies one value per forecast step.
    pub fn with_regressor(mut self, name: impl Into<String>, history: Vec<f64>, future: Vec<f64>) -> Self {
        self.regressor = Some(Regressor {
            name: name.into(),
            history,
            future,
        });
        self
    }

    pub fn structure(&self) -> Option<NnarStructure> {
        self.fit.as_ref().map(|f| f.structure)
    }

    fn n_xreg(&self) -> usize {
        usize::from(self.regressor.is_some())
    }

    fn choose_structure(&self, series: &MonthlySeries) -> Result<NnarStructure> {
        let m = MonthlySeries::FREQUENCY;
        let y = &series.values;
        let seasonal = y.len() >= 2 * m;
        let p = match self.config.lags {
            Some(p) => p,
            None => {
                let adjusted = if seasonal {
                    Stl::new(m).decompose(y)?.seasonally_adjusted()
                } else {
                    y.to_vec()
                };
                // Keep enough training rows for the lagged design
                let max_order = (y.len() / 4).max(1);
                ar_order_by_aic(series.start, &adjusted, max_order)?
            }
        };
        let seasonal_p = usize::from(seasonal);
        let hidden = self.config.hidden.unwrap_or_else(|| {
            let inputs = (p + seasonal_p + self.n_xreg() + 1) as f64;
            ((inputs / 2.0).round() as usize).max(1)
        });
        Ok(NnarStructure {
            p,
            seasonal_p,
            hidden,
            period: m,
        })
    }

    fn input_row(lags: &[usize], ys: &[f64], t: usize, x: Option<f64>) -> Vec<f64> {
        let mut row: Vec<f64> = lags.iter().map(|l| ys[t - l]).collect();
        if let Some(x) = x {
            row.push(x);
        }
        row
    }

    fn ensemble_predict(nets: &[Network], row: &[f64]) -> f64 {
        nets.iter().map(|n| n.predict(row)).sum::<f64>() / nets.len() as f64
    }

    /// One recursive path on the standardised scale; `noise` adds an
    /// innovation per step
    fn roll_forward(
        fit: &NnarFit,
        history: &[f64],
        future_x: Option<&[f64]>,
        horizon: usize,
        mut noise: impl FnMut() -> f64,
    ) -> Vec<f64> {
        let mut ys = history.to_vec();
        for h in 0..horizon {
            let t = ys.len();
            let row = Self::input_row(&fit.lags, &ys, t, future_x.map(|x| x[h]));
            let next = Self::ensemble_predict(&fit.nets, &row) + noise();
            ys.push(next);
        }
        ys.split_off(history.len())
    }
}

/// AR order in `1..=max_order` with the lowest AIC among library AR fits.
/// Orders the library cannot estimate are skipped; order 1 is the fallback.
fn ar_order_by_aic(start: YearMonth, values: &[f64], max_order: usize) -> Result<usize> {
    let ts = monthly_time_series(start, values)?;
    let best = (1..=max_order)
        .filter_map(|p| {
            let mut ar = ARIMA::new(p, 0, 0);
            ar.fit(&ts).ok()?;
            let aic = ar.aic().filter(|a| a.is_finite())?;
            debug!(p, aic, "AR order candidate");
            Some((OrderedFloat(aic), p))
        })
        .min()
        .map(|(_, p)| p);
    Ok(best.unwrap_or(1))
}

impl Forecaster for Nnar {
    fn name(&self) -> String {
        let base = match self.structure() {
            Some(s) if s.seasonal_p > 0 => {
                format!("NNAR({},{},{})[{}]", s.p, s.seasonal_p, s.hidden, s.period)
            }
            Some(s) => format!("NNAR({},{})", s.p, s.hidden),
            None => "NNAR".to_string(),
        };
        match &self.regressor {
            Some(r) => format!("{base} with regressor {}", r.name),
            None => base,
        }
    }

    fn fit(&mut self, series: &MonthlySeries) -> Result<()> {
        let y = &series.values;
        if let Some(reg) = &self.regressor {
            if reg.history.len() != y.len() {
                return Err(ForecastError::InvalidInput(format!(
                    "regressor '{}' has {} observations, series has {}",
                    reg.name,
                    reg.history.len(),
                    y.len()
                )));
            }
        }

        let structure = self.choose_structure(series)?;
        let lags = structure.lags();
        let max_lag = structure.max_lag();
        let width = lags.len() + self.n_xreg();
        let needed = max_lag + width + 2;
        if y.len() < needed {
            return Err(ForecastError::insufficient("NNAR fit", needed, y.len()));
        }

        let y_scaler = Scaler::fit(y);
        let ys = y_scaler.transform_all(y);
        let x_scaler = self.regressor.as_ref().map(|r| Scaler::fit(&r.history));
        let xs: Option<Vec<f64>> = self
            .regressor
            .as_ref()
            .zip(x_scaler.as_ref())
            .map(|(r, s)| s.transform_all(&r.history));

        let (features, targets): (Vec<Vec<f64>>, Vec<f64>) = (max_lag..y.len())
            .map(|t| {
                let x = xs.as_ref().map(|x| x[t]);
                (Self::input_row(&lags, &ys, t, x), ys[t])
            })
            .unzip();
        let data = TrainingDataset::new(features, targets)?;

        let training = TrainingConfig {
            epochs: self.config.epochs,
            learning_rate: self.config.learning_rate,
            decay: self.config.decay,
        };
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut nets = Vec::with_capacity(self.config.repeats);
        for _ in 0..self.config.repeats {
            let mut net = Network::random(width, structure.hidden, &mut rng);
            let mse = net.train(&data, &training)?;
            debug!(inputs = net.inputs(), hidden = net.hidden(), mse, "trained network");
            nets.push(net);
        }

        let mut fitted = vec![f64::NAN; y.len()];
        let mut squared = 0.0;
        for (i, row) in data.features.iter().enumerate() {
            let pred = Self::ensemble_predict(&nets, row);
            squared += (data.targets[i] - pred).powi(2);
            fitted[max_lag + i] = y_scaler.inverse(pred);
        }
        let residual_sd = (squared / data.len() as f64).sqrt();

        self.fit = Some(NnarFit {
            structure,
            lags,
            y_scaler,
            x_scaler,
            nets,
            residual_sd,
        });
        self.history = Some(series.clone());
        self.fitted = fitted;
        info!(
            series = %series.name,
            model = %self.name(),
            networks = self.config.repeats,
            residual_sd = residual_sd * y_scaler.std_dev,
            "fitted NNAR"
        );
        Ok(())
    }

    fn forecast(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        let (fit, history) = match (&self.fit, &self.history) {
            (Some(f), Some(h)) => (f, h),
            _ => return Err(not_fitted(&self.name())),
        };
        if horizon == 0 {
            return assemble(self.name(), history, &self.fitted, &[], &[], levels);
        }

        let future_x: Option<Vec<f64>> = match (&self.regressor, &fit.x_scaler) {
            (Some(reg), Some(scaler)) => {
                if reg.future.len() != horizon {
                    return Err(ForecastError::InvalidInput(format!(
                        "regressor '{}' supplies {} future values for a horizon of {horizon}",
                        reg.name,
                        reg.future.len()
                    )));
                }
                Some(scaler.transform_all(&reg.future))
            }
            _ => None,
        };

        let ys = fit.y_scaler.transform_all(&history.values);
        let point_path = Self::roll_forward(fit, &ys, future_x.as_deref(), horizon, || 0.0);
        let points: Vec<f64> = point_path.iter().map(|v| fit.y_scaler.inverse(*v)).collect();

        let noise = Normal::new(0.0, fit.residual_sd.max(1e-12))
            .map_err(|e| ForecastError::ModelFit(format!("invalid residual spread: {e}")))?;
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let paths = self.config.simulation_paths.max(2);
        let mut sum = vec![0.0; horizon];
        let mut sum_sq = vec![0.0; horizon];
        for _ in 0..paths {
            let path = Self::roll_forward(fit, &ys, future_x.as_deref(), horizon, || {
                noise.sample(&mut rng)
            });
            for (h, v) in path.iter().enumerate() {
                let value = fit.y_scaler.inverse(*v);
                sum[h] += value;
                sum_sq[h] += value * value;
            }
        }
        let std_devs: Vec<f64> = sum
            .iter()
            .zip(&sum_sq)
            .map(|(s, sq)| {
                let mean = s / paths as f64;
                (sq / paths as f64 - mean * mean).max(0.0).sqrt()
            })
            .collect();

        assemble(self.name(), history, &self.fitted, &points, &std_devs, levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BALANCE_FORECAST;
    use crate::domain::YearMonth;
    use std::f64::consts::PI;

    fn quick_config() -> NnarConfig {
        NnarConfig {
            repeats: 4,
            epochs: 200,
            simulation_paths: 50,
            ..NnarConfig::default()
        }
    }

    fn production(n: usize) -> MonthlySeries {
        let values = (0..n)
            .map(|i| 500.0 + 350.0 * (2.0 * PI * (i as f64 - 3.0) / 12.0).sin() + ((i * 5) % 7) as f64)
            .collect();
        MonthlySeries::new("total_production", YearMonth::new(2019, 1).unwrap(), values).unwrap()
    }

    fn balance(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 900.0 * (2.0 * PI * (i as f64 - 3.0) / 12.0).sin())
            .collect()
    }

    #[test]
    fn test_structure_from_formula() {
        let mut nnar = Nnar::new(NnarConfig {
            lags: Some(2),
            ..quick_config()
        })
        .with_regressor("balance", balance(48), DEFAULT_BALANCE_FORECAST.to_vec());
        nnar.fit(&production(48)).unwrap();
        let s = nnar.structure().unwrap();
        assert_eq!(s.p, 2);
        assert_eq!(s.seasonal_p, 1);
        // round((2 + 1 + 1 + 1) / 2) = 3
        assert_eq!(s.hidden, 3);
        assert_eq!(nnar.name(), "NNAR(2,1,3)[12] with regressor balance");
    }

    #[test]
    fn test_regressor_forecast_aligns_with_future_values() {
        let series = production(48);
        let mut nnar = Nnar::new(quick_config()).with_regressor(
            "balance",
            balance(48),
            DEFAULT_BALANCE_FORECAST.to_vec(),
        );
        nnar.fit(&series).unwrap();
        let result = nnar.forecast(12, &[80.0, 95.0]).unwrap();
        assert_eq!(result.len(), DEFAULT_BALANCE_FORECAST.len());
        for (h, row) in result.rows.iter().enumerate() {
            assert_eq!(row.period, series.next_period().add_months(h as i64));
            assert!(row.point.is_finite());
        }
        assert!(result.bounds_are_ordered());
    }

    #[test]
    fn test_regressor_length_mismatch() {
        let mut nnar = Nnar::new(quick_config()).with_regressor("balance", balance(48), vec![1.0; 6]);
        nnar.fit(&production(48)).unwrap();
        assert!(matches!(nnar.forecast(12, &[95.0]), Err(ForecastError::InvalidInput(_))));

        let mut misaligned = Nnar::new(quick_config()).with_regressor("balance", balance(40), vec![0.0; 12]);
        assert!(matches!(
            misaligned.fit(&production(48)),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_short_series_drops_seasonal_lag() {
        let mut nnar = Nnar::new(quick_config());
        nnar.fit(&production(18)).unwrap();
        let s = nnar.structure().unwrap();
        assert_eq!(s.seasonal_p, 0);
        assert!(s.p >= 1);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut nnar = Nnar::new(quick_config());
            nnar.fit(&production(36)).unwrap();
            nnar.forecast(6, &[95.0]).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let mut nnar = Nnar::new(quick_config());
        nnar.fit(&production(36)).unwrap();
        let result = nnar.forecast(0, &[80.0, 95.0]).unwrap();
        assert!(result.is_empty());
        assert!(result.model.starts_with("NNAR("));
    }

    #[test]
    fn test_ar_order_stays_in_range() {
        let series = production(48);
        let p = ar_order_by_aic(series.start, &series.values, 6).unwrap();
        assert!((1..=6).contains(&p));
    }

    #[test]
    fn test_forecast_before_fit() {
        let nnar = Nnar::new(quick_config());
        assert!(matches!(nnar.forecast(12, &[95.0]), Err(ForecastError::ModelFit(_))));
    }
}
