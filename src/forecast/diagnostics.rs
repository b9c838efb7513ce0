//! Residual diagnostics for fitted models.

use anofox_forecast::features::autocorrelation::autocorrelation;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Ljung-Box portmanteau test on residuals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LjungBox {
    pub statistic: f64,
    pub lags: usize,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

impl LjungBox {
    /// `None` when there are too few residuals or lags for the fitted
    /// parameter count
    pub fn test(residuals: &[f64], lags: usize, fitted_params: usize) -> Option<Self> {
        let n = residuals.len();
        if lags == 0 || n <= lags || lags <= fitted_params {
            return None;
        }
        let nf = n as f64;
        let statistic = nf
            * (nf + 2.0)
            * (1..=lags)
                .map(|k| {
                    let rk = autocorrelation(residuals, k);
                    rk * rk / (nf - k as f64)
                })
                .sum::<f64>();
        if !statistic.is_finite() {
            return None;
        }
        let df = lags - fitted_params;
        let chi = ChiSquared::new(df as f64).ok()?;
        Some(Self {
            statistic,
            lags,
            degrees_of_freedom: df,
            p_value: 1.0 - chi.cdf(statistic),
        })
    }

    /// No evidence of leftover autocorrelation at 5 %
    pub fn is_white_noise(&self) -> bool {
        self.p_value > 0.05
    }
}
