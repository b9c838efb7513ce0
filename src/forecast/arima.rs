//! Fixed-order seasonal ARIMA estimated by `anofox_forecast`.
//!
//! Non-seasonal orders go to the library's `ARIMA`, seasonal orders to its
//! `SARIMA`. Information criteria are computed here from the library
//! residuals after the differencing lags, so that every candidate of an order
//! search is scored on the same footing:
//!
//! ```text
//! ln L = -n/2 · (ln(2π σ²) + 1),  k = p + q + P + Q + 2  (intercept, σ²)
//! ```

use anofox_forecast::core::TimeSeries;
use anofox_forecast::models::arima::{ARIMA, SARIMA};
use anofox_forecast::models::Forecaster as Estimator;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::debug;

use super::{assemble_bands, monthly_time_series, not_fitted, predict_bands, Band, Forecaster};
use crate::domain::{ForecastResult, MonthlySeries};
use crate::error::{ForecastError, Result};

/// Residual degrees of freedom required beyond the estimated parameters
const MIN_RESIDUAL_DF: usize = 3;

/// `(p,d,q)(P,D,Q)[m]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 1,
        }
    }

    pub fn seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal_p = p;
        self.seasonal_d = d;
        self.seasonal_q = q;
        self.period = period;
        self
    }

    pub fn is_seasonal(&self) -> bool {
        self.period > 1 && self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    /// Observations consumed by differencing
    pub fn differencing_lag(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// Number of ARMA coefficients
    pub fn arma_terms(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Shortest series this order can be estimated on
    pub fn min_observations(&self) -> usize {
        let conditioning = self.p + self.seasonal_p * self.period;
        self.differencing_lag() + conditioning + self.arma_terms() + 1 + MIN_RESIDUAL_DF
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(
                f,
                "({},{},{})[{}]",
                self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
            )?;
        }
        Ok(())
    }
}

/// Information criterion used to rank candidate models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformationCriterion {
    Aic,
    Aicc,
    Bic,
}

/// Fit statistics of an estimated order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArimaFit {
    pub order: ArimaOrder,
    /// Library intercept, reported for non-seasonal orders only
    pub intercept: Option<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub aicc: f64,
    pub bic: f64,
    /// Residuals entering the likelihood
    pub n_used: usize,
    pub residuals: Vec<f64>,
}

impl ArimaFit {
    /// Gaussian likelihood and criteria from residuals. `None` for a
    /// degenerate (zero or non-finite) residual variance.
    pub fn from_residuals(order: ArimaOrder, residuals: Vec<f64>, intercept: Option<f64>) -> Option<Self> {
        let n = residuals.len();
        let k = (order.arma_terms() + 2) as f64;
        let nf = n as f64;
        if nf <= k + 1.0 {
            return None;
        }
        let sigma2 = residuals.iter().map(|e| e * e).sum::<f64>() / nf;
        if !(sigma2 > 0.0 && sigma2.is_finite()) {
            return None;
        }
        let log_likelihood = -0.5 * nf * ((2.0 * PI * sigma2).ln() + 1.0);
        let aic = -2.0 * log_likelihood + 2.0 * k;
        Some(Self {
            order,
            intercept,
            sigma2,
            log_likelihood,
            aic,
            aicc: aic + 2.0 * k * (k + 1.0) / (nf - k - 1.0),
            bic: -2.0 * log_likelihood + k * nf.ln(),
            n_used: n,
            residuals,
        })
    }

    pub fn criterion(&self, ic: InformationCriterion) -> f64 {
        match ic {
            InformationCriterion::Aic => self.aic,
            InformationCriterion::Aicc => self.aicc,
            InformationCriterion::Bic => self.bic,
        }
    }

    /// Estimated coefficients, intercept included
    pub fn parameter_count(&self) -> usize {
        self.order.arma_terms() + 1
    }
}

/// Library model behind an order
enum Backend {
    Plain(ARIMA),
    Seasonal(SARIMA),
}

impl Backend {
    fn new(o: ArimaOrder) -> Self {
        if o.is_seasonal() {
            Self::Seasonal(SARIMA::new(
                o.p,
                o.d,
                o.q,
                o.seasonal_p,
                o.seasonal_d,
                o.seasonal_q,
                o.period,
            ))
        } else {
            Self::Plain(ARIMA::new(o.p, o.d, o.q))
        }
    }

    fn fit(&mut self, ts: &TimeSeries) -> std::result::Result<(), String> {
        match self {
            Self::Plain(m) => m.fit(ts).map_err(|e| e.to_string()),
            Self::Seasonal(m) => m.fit(ts).map_err(|e| e.to_string()),
        }
    }

    fn residuals(&self) -> Option<Vec<f64>> {
        match self {
            Self::Plain(m) => m.residuals().map(|r| r.to_vec()),
            Self::Seasonal(m) => m.residuals().map(|r| r.to_vec()),
        }
    }

    fn fitted(&self) -> Option<Vec<f64>> {
        match self {
            Self::Plain(m) => m.fitted_values().map(|f| f.to_vec()),
            Self::Seasonal(m) => m.fitted_values().map(|f| f.to_vec()),
        }
    }

    fn intercept(&self) -> Option<f64> {
        match self {
            Self::Plain(m) => Some(m.intercept()),
            Self::Seasonal(_) => None,
        }
    }

    fn bands(&self, label: &str, horizon: usize, levels: &[f64]) -> Result<(Vec<f64>, Vec<Band>)> {
        match self {
            Self::Plain(m) => predict_bands(m, label, horizon, levels),
            Self::Seasonal(m) => predict_bands(m, label, horizon, levels),
        }
    }
}

/// ARIMA model with a fixed order
pub struct Arima {
    order: ArimaOrder,
    backend: Option<Backend>,
    fit: Option<ArimaFit>,
    history: Option<MonthlySeries>,
    fitted: Vec<f64>,
}

impl Arima {
    pub fn new(order: ArimaOrder) -> Result<Self> {
        if order.seasonal_p + order.seasonal_d + order.seasonal_q > 0 && order.period < 2 {
            return Err(ForecastError::InvalidInput(format!(
                "{order}: seasonal terms need a period of at least 2"
            )));
        }
        Ok(Self {
            order,
            backend: None,
            fit: None,
            history: None,
            fitted: Vec::new(),
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn estimate(&self) -> Option<&ArimaFit> {
        self.fit.as_ref()
    }

    fn constant_label(&self) -> &'static str {
        let intercept = self.fit.as_ref().and_then(|f| f.intercept).unwrap_or(0.0);
        match (intercept.abs() > 1e-8, self.order.differencing_lag()) {
            (false, _) => "",
            (true, 0) => " with non-zero mean",
            (true, 1) => " with drift",
            (true, _) => "",
        }
    }
}

impl Forecaster for Arima {
    fn name(&self) -> String {
        format!("{}{}", self.order, self.constant_label())
    }

    fn fit(&mut self, series: &MonthlySeries) -> Result<()> {
        let order = self.order;
        let n = series.len();
        let needed = order.min_observations();
        if n < needed {
            return Err(ForecastError::insufficient("ARIMA fit", needed, n));
        }

        let ts = monthly_time_series(series.start, &series.values)?;
        let mut backend = Backend::new(order);
        backend
            .fit(&ts)
            .map_err(|e| ForecastError::ModelFit(format!("{order}: {e}")))?;

        let residuals = backend
            .residuals()
            .ok_or_else(|| ForecastError::ModelFit(format!("{order}: no residuals after fit")))?;
        // Residual vectors may already exclude the differenced observations
        let skip = order
            .differencing_lag()
            .saturating_sub(n.saturating_sub(residuals.len()));
        let used: Vec<f64> = residuals
            .into_iter()
            .skip(skip)
            .filter(|e| e.is_finite())
            .collect();
        let fit = ArimaFit::from_residuals(order, used, backend.intercept()).ok_or_else(|| {
            ForecastError::ModelFit(format!("{order}: degenerate residual variance"))
        })?;

        let mut fitted = match backend.fitted() {
            Some(f) if f.len() == n => f,
            _ => vec![f64::NAN; n],
        };
        fitted
            .iter_mut()
            .take(order.differencing_lag())
            .for_each(|v| *v = f64::NAN);

        debug!(
            model = %order,
            aicc = fit.aicc,
            sigma2 = fit.sigma2,
            n_used = fit.n_used,
            "fitted ARIMA"
        );
        self.backend = Some(backend);
        self.fit = Some(fit);
        self.history = Some(series.clone());
        self.fitted = fitted;
        Ok(())
    }

    fn forecast(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        let (backend, history) = match (&self.backend, &self.history) {
            (Some(b), Some(h)) => (b, h),
            _ => return Err(not_fitted(&self.name())),
        };
        let name = self.name();
        let (points, bands) = backend.bands(&name, horizon, levels)?;
        assemble_bands(name, history, &self.fitted, &points, &bands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YearMonth;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn series(values: Vec<f64>) -> MonthlySeries {
        MonthlySeries::new("test", YearMonth::new(2018, 1).unwrap(), values).unwrap()
    }

    fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut y = vec![0.0; n];
        for t in 1..n {
            y[t] = phi * y[t - 1] + noise.sample(&mut rng);
        }
        y.iter().map(|v| v + 50.0).collect()
    }

    #[test]
    fn test_order_display() {
        assert_eq!(ArimaOrder::new(1, 1, 0).to_string(), "ARIMA(1,1,0)");
        assert_eq!(
            ArimaOrder::new(0, 1, 1).seasonal(0, 1, 1, 12).to_string(),
            "ARIMA(0,1,1)(0,1,1)[12]"
        );
    }

    #[test]
    fn test_min_observations() {
        // 1 + 12 differenced, 1 + 12 conditioning, 2 + 1 parameters, 3 spare
        let order = ArimaOrder::new(1, 1, 0).seasonal(1, 1, 0, 12);
        assert_eq!(order.min_observations(), 13 + 13 + 3 + 3);
        assert_eq!(ArimaOrder::new(0, 0, 0).min_observations(), 4);
    }

    #[test]
    fn test_criteria_from_residuals() {
        let residuals: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let fit = ArimaFit::from_residuals(ArimaOrder::new(1, 0, 0), residuals, Some(50.0)).unwrap();
        assert_eq!(fit.sigma2, 1.0);
        // k = 3, n = 30
        assert!((fit.aicc - fit.aic - 24.0 / 26.0).abs() < 1e-12);
        assert!((fit.bic - (fit.aic + 3.0 * 30f64.ln() - 6.0)).abs() < 1e-9);
        assert_eq!(fit.criterion(InformationCriterion::Bic), fit.bic);
        assert_eq!(fit.parameter_count(), 2);
    }

    #[test]
    fn test_degenerate_residuals() {
        assert!(ArimaFit::from_residuals(ArimaOrder::new(0, 1, 0), vec![0.0; 20], None).is_none());
        assert!(ArimaFit::from_residuals(ArimaOrder::new(0, 1, 0), vec![1.0, -1.0], None).is_none());
    }

    #[test]
    fn test_ar1_fit_and_forecast() {
        let mut model = Arima::new(ArimaOrder::new(1, 0, 0)).unwrap();
        model.fit(&series(ar1(0.7, 120, 7))).unwrap();
        let fit = model.estimate().unwrap();
        assert!(fit.sigma2 > 0.5 && fit.sigma2 < 2.0, "sigma2 = {}", fit.sigma2);
        assert!(model.name().starts_with("ARIMA(1,0,0)"));

        let result = model.forecast(3, &[80.0, 95.0]).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.rows[0].period, YearMonth::new(2028, 1).unwrap());
        assert!(result.bounds_are_ordered());
        let narrow = result.rows[0].interval(80.0).unwrap();
        let wide = result.rows[0].interval(95.0).unwrap();
        assert!(wide.upper - wide.lower >= narrow.upper - narrow.lower);
    }

    #[test]
    fn test_forecast_before_fit() {
        let model = Arima::new(ArimaOrder::new(1, 0, 0)).unwrap();
        assert!(matches!(model.forecast(12, &[95.0]), Err(ForecastError::ModelFit(_))));
    }

    #[test]
    fn test_too_short_for_order() {
        let mut model = Arima::new(ArimaOrder::new(5, 1, 0)).unwrap();
        assert!(matches!(
            model.fit(&series(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_seasonal_terms_need_a_period() {
        assert!(Arima::new(ArimaOrder::new(0, 1, 0).seasonal(1, 0, 0, 1)).is_err());
    }

    #[test]
    fn test_zero_horizon() {
        let mut model = Arima::new(ArimaOrder::new(0, 1, 0)).unwrap();
        model.fit(&series(ar1(0.5, 30, 1))).unwrap();
        assert!(model.forecast(0, &[95.0]).unwrap().is_empty());
    }
}
