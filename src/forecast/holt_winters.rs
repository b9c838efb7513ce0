//! Holt-Winters seasonal exponential smoothing in ETS state-space form,
//! estimated by `anofox_forecast`'s `ETS`.
//!
//! Three configurations are supported:
//!
//! - `Additive`: ETS(A,A,A), `y_t = l + b + s + e`
//! - `Multiplicative`: ETS(M,A,M), `y_t = (l + b)·s·(1 + e)`
//! - `DampedMultiplicative`: ETS(M,Ad,M), `y_t = (l + φb)·s·(1 + e)`
//!
//! The library maximises the likelihood with `φ` held in `[0.8, 0.98]`.

use anofox_forecast::models::exponential::{ETSSeasonalType, ETSSpec, ErrorType, TrendType, ETS};
use anofox_forecast::models::Forecaster as Estimator;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tracing::info;

use super::{assemble_bands, monthly_time_series, not_fitted, predict_bands, Forecaster};
use crate::domain::{ForecastResult, MonthlySeries};
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HoltWintersVariant {
    Additive,
    Multiplicative,
    DampedMultiplicative,
}

impl HoltWintersVariant {
    pub fn spec(&self) -> ETSSpec {
        match self {
            Self::Additive => ETSSpec::aaa(),
            Self::Multiplicative => ETSSpec::mam(),
            Self::DampedMultiplicative => ETSSpec::new(
                ErrorType::Multiplicative,
                TrendType::AdditiveDamped,
                ETSSeasonalType::Multiplicative,
            ),
        }
    }

    /// e.g. `ETS(M,Ad,M)`
    pub fn ets_label(&self) -> String {
        self.spec().short_name()
    }

    pub fn is_multiplicative(&self) -> bool {
        !matches!(self, Self::Additive)
    }
}

/// Estimated smoothing parameters and fit statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub phi: Option<f64>,
    pub aicc: Option<f64>,
}

pub struct HoltWinters {
    variant: HoltWintersVariant,
    model: Option<ETS>,
    history: Option<MonthlySeries>,
    fitted: Vec<f64>,
}

impl HoltWinters {
    pub fn new(variant: HoltWintersVariant) -> Self {
        Self {
            variant,
            model: None,
            history: None,
            fitted: Vec::new(),
        }
    }

    pub fn variant(&self) -> HoltWintersVariant {
        self.variant
    }

    pub fn params(&self) -> Option<SmoothingParams> {
        let model = self.model.as_ref()?;
        Some(SmoothingParams {
            alpha: model.alpha()?,
            beta: model.beta(),
            gamma: model.gamma(),
            phi: model.phi(),
            aicc: model.aicc(),
        })
    }
}

impl Forecaster for HoltWinters {
    fn name(&self) -> String {
        format!("Holt-Winters {} {}", self.variant, self.variant.ets_label())
    }

    fn fit(&mut self, series: &MonthlySeries) -> Result<()> {
        let m = MonthlySeries::FREQUENCY;
        let y = &series.values;
        if y.len() < 2 * m {
            return Err(ForecastError::insufficient("Holt-Winters fit", 2 * m, y.len()));
        }
        if self.variant.is_multiplicative() {
            if let Some(i) = y.iter().position(|v| *v <= 0.0) {
                return Err(ForecastError::ModelFit(format!(
                    "{}: multiplicative seasonality needs strictly positive data, got {} at {}",
                    self.name(),
                    y[i],
                    series.period_at(i)
                )));
            }
        }

        let ts = monthly_time_series(series.start, y)?;
        let mut model = ETS::new(self.variant.spec(), m);
        model
            .fit(&ts)
            .map_err(|e| ForecastError::ModelFit(format!("{}: {e}", self.name())))?;

        // The first cycle seeds the seasonal state and is echoed back as fitted
        let mut fitted = match model.fitted_values() {
            Some(f) if f.len() == y.len() => f.to_vec(),
            _ => vec![f64::NAN; y.len()],
        };
        fitted.iter_mut().take(m).for_each(|v| *v = f64::NAN);

        info!(
            series = %series.name,
            model = %self.name(),
            alpha = model.alpha(),
            beta = model.beta(),
            gamma = model.gamma(),
            phi = model.phi(),
            aicc = model.aicc(),
            "fitted Holt-Winters"
        );
        self.model = Some(model);
        self.history = Some(series.clone());
        self.fitted = fitted;
        Ok(())
    }

    fn forecast(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult> {
        let (model, history) = match (&self.model, &self.history) {
            (Some(m), Some(h)) => (m, h),
            _ => return Err(not_fitted(&self.name())),
        };
        let name = self.name();
        let (points, bands) = predict_bands(model, &name, horizon, levels)?;
        assemble_bands(name, history, &self.fitted, &points, &bands)
    }
}
