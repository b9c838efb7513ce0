//! In-sample accuracy and normal prediction intervals.
//!
//! Every forecaster reports its accuracy on the months it fitted and turns
//! a per-step forecast standard deviation into interval bounds here.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

use crate::domain::IntervalBound;

/// Smallest |actual| still used as a MAPE denominator
const MAPE_FLOOR: f64 = 1e-6;

/// Accuracy of fitted values against the observed series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error in percent, over months with a
    /// non-zero actual value
    pub mape: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Months that had a fitted value
    pub sample_count: usize,
    /// Largest absolute residual
    pub max_error: f64,
    /// Smallest absolute residual
    pub min_error: f64,
    /// Population standard deviation of the residuals
    pub std_dev: f64,
}

impl ForecastMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        if actual.len() != predicted.len() {
            return Err(ForecastMetricsError::DimensionMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(ForecastMetricsError::EmptyData);
        }

        let n = actual.len() as f64;
        let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let sse: f64 = residuals.iter().map(|e| e * e).sum();
        let mae = residuals.iter().map(|e| e.abs()).sum::<f64>() / n;

        let (pct_sum, pct_count) = actual
            .iter()
            .zip(&residuals)
            .filter(|(a, _)| a.abs() > MAPE_FLOOR)
            .fold((0.0, 0usize), |(s, c), (a, e)| (s + (e / a).abs() * 100.0, c + 1));
        let mape = if pct_count == 0 {
            0.0
        } else {
            pct_sum / pct_count as f64
        };

        let mean = actual.iter().sum::<f64>() / n;
        let sst: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if sst > 1e-10 { 1.0 - sse / sst } else { 0.0 };

        let bias = residuals.iter().sum::<f64>() / n;
        let spread = residuals.iter().map(|e| (e - bias).powi(2)).sum::<f64>() / n;
        let (min_error, max_error) = residuals
            .iter()
            .map(|e| e.abs())
            .fold((f64::INFINITY, 0.0f64), |(lo, hi), e| (lo.min(e), hi.max(e)));

        Ok(Self {
            mae,
            rmse: (sse / n).sqrt(),
            mape,
            r2,
            sample_count: actual.len(),
            max_error,
            min_error,
            std_dev: spread.sqrt(),
        })
    }

    /// Metrics over the positions where `fitted` is finite. Lag-based models
    /// have no fitted value for their first observations.
    pub fn from_fitted(actual: &[f64], fitted: &[f64]) -> Option<Self> {
        let (a, p): (Vec<f64>, Vec<f64>) = actual
            .iter()
            .zip(fitted)
            .filter(|(_, f)| f.is_finite())
            .map(|(a, f)| (*a, *f))
            .unzip();
        Self::calculate(&a, &p).ok()
    }

    pub fn quality(&self) -> ForecastQuality {
        match self.mape {
            m if m < 5.0 => ForecastQuality::Excellent,
            m if m < 10.0 => ForecastQuality::Good,
            m if m < 20.0 => ForecastQuality::Fair,
            m if m < 50.0 => ForecastQuality::Poor,
            _ => ForecastQuality::VeryPoor,
        }
    }

    /// MAPE under 20 %, R² above 0.5 and at least two years of fitted months
    pub fn is_reliable(&self) -> bool {
        self.mape < 20.0 && self.r2 > 0.5 && self.sample_count >= 24
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE={:.2} RMSE={:.2} MAPE={:.2}% R²={:.3} ({:?}, n={})",
            self.mae,
            self.rmse,
            self.mape,
            self.r2,
            self.quality(),
            self.sample_count
        )
    }
}

/// MAPE bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("length mismatch: {actual} actual vs {predicted} predicted values")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("no values to score")]
    EmptyData,

    #[error("confidence level must lie in (0, 100), got {0}")]
    InvalidLevel(f64),
}

impl From<ForecastMetricsError> for crate::error::ForecastError {
    fn from(err: ForecastMetricsError) -> Self {
        crate::error::ForecastError::InvalidInput(err.to_string())
    }
}

/// Two-sided normal interval at one confidence level
#[derive(Debug, Clone, Copy)]
pub struct PredictionInterval {
    /// Percent, e.g. 95.0
    level: f64,
    z: f64,
}

impl PredictionInterval {
    pub fn new(level: f64) -> Result<Self, ForecastMetricsError> {
        if !(level > 0.0 && level < 100.0) {
            return Err(ForecastMetricsError::InvalidLevel(level));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|_| ForecastMetricsError::InvalidLevel(level))?;
        Ok(Self {
            level,
            z: normal.inverse_cdf(0.5 + level / 200.0),
        })
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn z_score(&self) -> f64 {
        self.z
    }

    /// `point ± z·sd`. Bounds are never clamped, balance forecasts go negative.
    pub fn bounds(&self, point: f64, std_dev: f64) -> IntervalBound {
        let margin = self.z * std_dev.max(0.0);
        IntervalBound {
            level: self.level,
            lower: point - margin,
            upper: point + margin,
        }
    }
}

pub fn interval_set(levels: &[f64]) -> Result<Vec<PredictionInterval>, ForecastMetricsError> {
    levels.iter().map(|&l| PredictionInterval::new(l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_exact_fit() {
        let y = [120.0, 340.0, 610.0, 580.0, 260.0];
        let m = ForecastMetrics::calculate(&y, &y).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.quality(), ForecastQuality::Excellent);
    }

    #[test]
    fn test_percentage_error_skips_zero_months() {
        let actual = [0.0, 100.0, 200.0];
        let predicted = [5.0, 110.0, 190.0];
        let m = ForecastMetrics::calculate(&actual, &predicted).unwrap();
        // (10 % + 5 %) / 2
        assert!((m.mape - 7.5).abs() < 1e-9);
        assert!((m.mae - 25.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.max_error, 10.0);
        assert_eq!(m.min_error, 5.0);
        assert!(!m.is_reliable());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            ForecastMetrics::calculate(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(ForecastMetricsError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            ForecastMetrics::calculate(&[], &[]),
            Err(ForecastMetricsError::EmptyData)
        ));
    }

    #[test]
    fn test_from_fitted_skips_warmup() {
        let actual = [10.0, 20.0, 30.0, 40.0];
        let fitted = [f64::NAN, f64::NAN, 29.0, 41.0];
        let m = ForecastMetrics::from_fitted(&actual, &fitted).unwrap();
        assert_eq!(m.sample_count, 2);
        assert!((m.mae - 1.0).abs() < 1e-9);
        assert!(ForecastMetrics::from_fitted(&actual, &[f64::NAN; 4]).is_none());
    }

    #[rstest]
    #[case(80.0, 1.281552)]
    #[case(95.0, 1.959964)]
    fn test_z_scores(#[case] level: f64, #[case] expected: f64) {
        let z = PredictionInterval::new(level).unwrap().z_score();
        assert!((z - expected).abs() < 1e-4);
    }

    #[rstest]
    #[case(0.0)]
    #[case(100.0)]
    #[case(-5.0)]
    #[case(f64::NAN)]
    fn test_invalid_levels(#[case] level: f64) {
        assert!(PredictionInterval::new(level).is_err());
    }

    #[test]
    fn test_negative_points_are_not_clamped() {
        let b = PredictionInterval::new(80.0).unwrap().bounds(-500.0, 100.0);
        assert!(b.lower < -500.0);
        assert!(b.upper > -500.0 && b.upper < -300.0);
        assert!(((-500.0 - b.lower) - (b.upper + 500.0)).abs() < 1e-9);
    }
}
