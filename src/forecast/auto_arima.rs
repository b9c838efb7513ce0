//! Automatic ARIMA order selection.
//!
//! Differencing orders are fixed first: `D` from the STL seasonal strength,
//! `d` from the library's own unit-root based order choice on the
//! (seasonally differenced) series. Every `(p,q)(P,Q)` combination within
//! the configured bounds is then estimated (no stepwise shortcut) and the
//! lowest information criterion wins.

use anofox_forecast::models::arima::AutoARIMA;
use anofox_forecast::models::Forecaster as Estimator;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::arima::{Arima, ArimaOrder};
use super::diagnostics::LjungBox;
use super::{monthly_time_series, not_fitted, Forecaster};
use crate::analysis::Stl;
use crate::config::ArimaConfig;
use crate::domain::{ForecastResult, MonthlySeries, YearMonth};
use crate::error::{ForecastError, Result};

/// Seasonal strength above which one seasonal difference is taken
pub const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// One evaluated candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub model: String,
    pub score: f64,
}

pub struct AutoArima {
    config: ArimaConfig,
    selected: Option<Arima>,
    candidates: Vec<CandidateScore>,
    diagnostics: Option<LjungBox>,
}

impl AutoArima {
    pub fn new(config: ArimaConfig) -> Self {
        Self {
            config,
            selected: None,
            candidates: Vec::new(),
            diagnostics: None,
        }
    }

    pub fn selected(&self) -> Option<&Arima> {
        self.selected.as_ref()
    }

    /// Successfully fitted candidates with their criterion value
    pub fn candidates(&self) -> &[CandidateScore] {
        &self.candidates
    }

    /// Ljung-Box test on the selected model's residuals
    pub fn diagnostics(&self) -> Option<&LjungBox> {
        self.diagnostics.as_ref()
    }

    /// `(d, D, seasonal)` for `series`
    fn differencing(&self, series: &MonthlySeries) -> Result<(usize, usize, bool)> {
        let m = MonthlySeries::FREQUENCY;
        let y = &series.values;
        let seasonal = y.len() >= 2 * m;
        let seasonal_d = if seasonal && self.config.max_seasonal_d > 0 {
            let strength = Stl::new(m).decompose(y)?.seasonal_strength();
            debug!(strength, "seasonal strength");
            usize::from(strength > SEASONAL_STRENGTH_THRESHOLD)
        } else {
            0
        };
        let d = if seasonal_d > 0 {
            let lagged: Vec<f64> = y.iter().zip(&y[m..]).map(|(a, b)| b - a).collect();
            self.differencing_order(series.start.add_months(m as i64), &lagged)
        } else {
            self.differencing_order(series.start, y)
        };
        Ok((d, seasonal_d, seasonal))
    }

    /// Non-seasonal `d` picked by the library's automatic search, capped at
    /// `max_d`. Falls back to no differencing when that search fails.
    fn differencing_order(&self, start: YearMonth, values: &[f64]) -> usize {
        let selected = monthly_time_series(start, values).ok().and_then(|ts| {
            let mut search = AutoARIMA::new();
            search.fit(&ts).ok()?;
            search.selected_order()
        });
        match selected {
            Some((_, d, _)) => d.min(self.config.max_d),
            None => {
                debug!(n = values.len(), "no differencing order found, using d = 0");
                0
            }
        }
    }

    fn candidate_orders(&self, d: usize, seasonal_d: usize, seasonal: bool) -> Vec<ArimaOrder> {
        let cfg = &self.config;
        let (max_sp, max_sq) = if seasonal {
            (cfg.max_seasonal_p, cfg.max_seasonal_q)
        } else {
            (0, 0)
        };

        let mut orders = Vec::new();
        for p in 0..=cfg.max_p {
            for q in 0..=cfg.max_q {
                for sp in 0..=max_sp {
                    for sq in 0..=max_sq {
                        if p + q + sp + sq > cfg.max_order {
                            continue;
                        }
                        let mut order = ArimaOrder::new(p, d, q);
                        if seasonal {
                            order = order.seasonal(sp, seasonal_d, sq, MonthlySeries::FREQUENCY);
                        }
                        orders.push(order);
                    }
                }
            }
        }
        orders
    }
}

impl Forecaster for AutoArima {
    fn name(&self) -> String {
        match &self.selected {
            Some(model) => model.name(),
            None => "auto ARIMA".to_string(),
        }
    }

    fn fit(&mut self, series: &MonthlySeries) -> Result<()> {
        let (d, seasonal_d, seasonal) = self.differencing(series)?;
        if !seasonal {
            debug!(n = series.len(), "series shorter than two cycles, non-seasonal search");
        }
        let (orders, too_long): (Vec<ArimaOrder>, Vec<ArimaOrder>) = self
            .candidate_orders(d, seasonal_d, seasonal)
            .into_iter()
            .partition(|o| o.min_observations() <= series.len());
        info!(
            series = %series.name,
            d,
            seasonal_d,
            candidates = orders.len(),
            skipped = too_long.len(),
            "searching ARIMA orders"
        );

        let criterion = self.config.criterion;
        let mut best: Option<(OrderedFloat<f64>, Arima)> = None;
        self.candidates.clear();
        for order in orders {
            let mut model = Arima::new(order)?;
            if let Err(err) = model.fit(series) {
                debug!(model = %order, error = %err, "skipped candidate");
                continue;
            }
            let Some(score) = model.estimate().map(|f| f.criterion(criterion)) else {
                continue;
            };
            if !score.is_finite() {
                warn!(model = %model.name(), "candidate has a non-finite criterion");
                continue;
            }
            debug!(model = %model.name(), score, "candidate");
            self.candidates.push(CandidateScore {
                model: model.name(),
                score,
            });
            let score = OrderedFloat(score);
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((score, model));
            }
        }

        let (score, model) = best.ok_or_else(|| {
            ForecastError::ModelFit(format!(
                "no ARIMA candidate could be fitted to {} ({} observations)",
                series.name,
                series.len()
            ))
        })?;

        self.diagnostics = model.estimate().and_then(|fit| {
            let lags = (2 * MonthlySeries::FREQUENCY).min(fit.residuals.len() / 5);
            LjungBox::test(&fit.residuals, lags, fit.parameter_count())
        });
        info!(
            series = %series.name,
            model = %model.name(),
            criterion = ?criterion,
            score = score.into_inner(),
            ljung_box_p = self.diagnostics.as_ref().map(|lb| lb.p_value),
            "selected ARIMA model"
        );
        self.selected = Some(model);
        Ok(())
    }

    fn forecast(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        match &self.selected {
            Some(model) => model.forecast(horizon, levels),
            None => Err(not_fitted(&self.name())),
        }
    }
}
