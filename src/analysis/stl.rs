//! Additive STL decomposition on top of `anofox_forecast::seasonality::STL`.
//!
//! `Y = Trend + Seasonal + Remainder`. The seasonal smoother spans the whole
//! series and each cycle position is then replaced by its mean, which is
//! what a periodic seasonal window produces. Strength measures follow
//! `F = max(0, 1 - Var(R) / Var(X + R))`.

use anofox_forecast::seasonality::STL;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::error::{ForecastError, Result};

/// STL decomposition settings
#[derive(Debug, Clone)]
pub struct Stl {
    period: usize,
    robust: bool,
}

/// Additive decomposition of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StlDecomposition {
    pub period: usize,
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

impl Stl {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            robust: false,
        }
    }

    /// Down-weight outliers with robustness iterations
    pub fn robust(mut self) -> Self {
        self.robust = true;
        self
    }

    pub fn decompose(&self, y: &[f64]) -> Result<StlDecomposition> {
        let n = y.len();
        let m = self.period;
        if m < 2 {
            return Err(ForecastError::InvalidInput(format!(
                "seasonal period must be at least 2, got {m}"
            )));
        }
        if n < 2 * m {
            return Err(ForecastError::insufficient("STL decomposition", 2 * m, n));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidInput(
                "STL decomposition requires finite values".into(),
            ));
        }

        // Periodic seasonal window is 10n + 1, as in the classic implementation
        let mut stl = STL::new(m).with_seasonal_smoothness(10 * n + 1);
        if self.robust {
            stl = stl.robust();
        }
        let raw = stl.decompose(y).ok_or_else(|| {
            ForecastError::ModelFit(format!("STL decomposition of {n} values failed"))
        })?;

        let seasonal = periodic(&raw.seasonal, m);
        let trend = raw.trend;
        let remainder: Vec<f64> = (0..n).map(|t| y[t] - trend[t] - seasonal[t]).collect();
        debug!(n, period = m, robust = self.robust, "STL decomposition");

        Ok(StlDecomposition {
            period: m,
            observed: y.to_vec(),
            trend,
            seasonal,
            remainder,
        })
    }
}

impl StlDecomposition {
    /// Observed series with the seasonal component removed
    pub fn seasonally_adjusted(&self) -> Vec<f64> {
        self.observed
            .iter()
            .zip(&self.seasonal)
            .map(|(y, s)| y - s)
            .collect()
    }

    pub fn trend_strength(&self) -> f64 {
        strength(&self.remainder, &self.trend)
    }

    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.remainder, &self.seasonal)
    }
}

/// Every cycle position gets its average seasonal value
fn periodic(seasonal: &[f64], m: usize) -> Vec<f64> {
    let mut sum = vec![0.0; m];
    let mut count = vec![0usize; m];
    for (t, s) in seasonal.iter().enumerate() {
        sum[t % m] += s;
        count[t % m] += 1;
    }
    (0..seasonal.len())
        .map(|t| sum[t % m] / count[t % m].max(1) as f64)
        .collect()
}

fn strength(remainder: &[f64], component: &[f64]) -> f64 {
    let combined: Vec<f64> = component.iter().zip(remainder).map(|(c, r)| c + r).collect();
    let total = combined.iter().variance();
    if !(total > 1e-12) {
        return 0.0;
    }
    (1.0 - remainder.iter().variance() / total).clamp(0.0, 1.0)
}
