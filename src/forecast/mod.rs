//! Forecasting models and their shared contract.
//!
//! ARIMA and exponential smoothing estimation is delegated to
//! `anofox_forecast`; this module adapts its models to monthly series and
//! to the [`ForecastResult`] layout.
pub mod arima;
pub mod auto_arima;
pub mod diagnostics;
pub mod holt_winters;
pub mod metrics;

pub use arima::*;
pub use auto_arima::*;
pub use diagnostics::*;
pub use holt_winters::*;
pub use metrics::*;

use anofox_forecast::core::TimeSeries;
use anofox_forecast::models::Forecaster as Estimator;
use chrono::{TimeZone, Utc};

use crate::domain::{ForecastResult, ForecastRow, IntervalBound, MonthlySeries, YearMonth};
use crate::error::{ForecastError, Result};

/// Common interface of every forecasting model
pub trait Forecaster {
    /// Model identifier, e.g. `ARIMA(1,1,0)(0,1,1)[12]`. Reflects the fitted
    /// structure once `fit` has succeeded.
    fn name(&self) -> String;

    /// Estimate the model on a complete monthly series
    fn fit(&mut self, series: &MonthlySeries) -> Result<()>;

    /// Point forecasts with bounds per confidence level (percent).
    /// `horizon == 0` yields an empty result.
    fn forecast(&self, horizon: usize, levels: &[f64]) -> Result<ForecastResult>;
}

pub(crate) fn not_fitted(model: &str) -> ForecastError {
    ForecastError::ModelFit(format!("{model}: forecast requested before fit"))
}

/// `values` stamped on the first day of consecutive months from `start`
pub(crate) fn monthly_time_series(start: YearMonth, values: &[f64]) -> Result<TimeSeries> {
    let timestamps = (0..values.len())
        .map(|i| {
            let period = start.add_months(i as i64);
            Utc.with_ymd_and_hms(period.year(), period.month(), 1, 0, 0, 0)
                .single()
                .ok_or_else(|| ForecastError::InvalidInput(format!("no timestamp for {period}")))
        })
        .collect::<Result<Vec<_>>>()?;
    TimeSeries::univariate(timestamps, values.to_vec())
        .map_err(|e| ForecastError::InvalidInput(format!("time series from {start}: {e}")))
}

/// Lower and upper bounds of one confidence level
pub(crate) struct Band {
    pub level: f64,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Point forecasts and one band per level from a fitted library model
pub(crate) fn predict_bands<M: Estimator>(
    model: &M,
    label: &str,
    horizon: usize,
    levels: &[f64],
) -> Result<(Vec<f64>, Vec<Band>)> {
    let intervals = interval_set(levels)?;
    if horizon == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let fail = |e: String| ForecastError::ModelFit(format!("{label}: {e}"));
    let points = model
        .predict(horizon)
        .map_err(|e| fail(e.to_string()))?
        .primary()
        .to_vec();
    let bands = intervals
        .iter()
        .map(|pi| {
            let forecast = model
                .predict_with_intervals(horizon, pi.level() / 100.0)
                .map_err(|e| fail(e.to_string()))?;
            let lower = forecast.lower_series(0).map_err(|e| fail(e.to_string()))?.to_vec();
            let upper = forecast.upper_series(0).map_err(|e| fail(e.to_string()))?.to_vec();
            Ok(Band {
                level: pi.level(),
                lower,
                upper,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((points, bands))
}

/// Rows from library bands. Bounds are widened to contain the point so that
/// `lower <= point <= upper` holds whatever the library returned.
pub(crate) fn assemble_bands(
    model: String,
    history: &MonthlySeries,
    fitted: &[f64],
    points: &[f64],
    bands: &[Band],
) -> Result<ForecastResult> {
    if let Some(short) = bands
        .iter()
        .find(|b| b.lower.len() < points.len() || b.upper.len() < points.len())
    {
        return Err(ForecastError::ModelFit(format!(
            "{model}: {} % band is shorter than the horizon",
            short.level
        )));
    }
    let rows = history
        .future_periods(points.len())
        .into_iter()
        .zip(points)
        .enumerate()
        .map(|(h, (period, &point))| ForecastRow {
            period,
            point,
            intervals: bands
                .iter()
                .map(|b| IntervalBound {
                    level: b.level,
                    lower: b.lower[h].min(point),
                    upper: b.upper[h].max(point),
                })
                .collect(),
        })
        .collect();
    let accuracy = ForecastMetrics::from_fitted(&history.values, fitted);
    Ok(ForecastResult::new(model, history.name.clone(), rows).with_accuracy(accuracy))
}

/// Turn point forecasts and their standard deviations into a result with one
/// interval per level and in-sample accuracy attached
pub(crate) fn assemble(
    model: String,
    history: &MonthlySeries,
    fitted: &[f64],
    points: &[f64],
    std_devs: &[f64],
    levels: &[f64],
) -> Result<ForecastResult> {
    let intervals = interval_set(levels)?;
    let rows = history
        .future_periods(points.len())
        .into_iter()
        .zip(points.iter().zip(std_devs))
        .map(|(period, (&point, &sd))| ForecastRow {
            period,
            point,
            intervals: intervals.iter().map(|pi| pi.bounds(point, sd)).collect(),
        })
        .collect();
    let accuracy = ForecastMetrics::from_fitted(&history.values, fitted);
    Ok(ForecastResult::new(model, history.name.clone(), rows).with_accuracy(accuracy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> MonthlySeries {
        MonthlySeries::new("x", YearMonth::new(2021, 11).unwrap(), vec![1.0, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn test_time_series_spans_year_boundary() {
        let ts = monthly_time_series(YearMonth::new(2021, 11).unwrap(), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(ts.len(), 3);
    }

    #[test]
    fn test_bands_are_widened_to_contain_point() {
        let bands = [Band {
            level: 80.0,
            lower: vec![9.0, 12.5],
            upper: vec![11.0, 13.0],
        }];
        let result = assemble_bands("m".into(), &history(), &[], &[10.0, 12.0], &bands).unwrap();
        assert_eq!(result.rows[0].period, YearMonth::new(2022, 2).unwrap());
        assert_eq!(result.rows[1].intervals[0].lower, 12.0);
        assert!(result.bounds_are_ordered());
    }

    #[test]
    fn test_short_band_is_rejected() {
        let bands = [Band {
            level: 95.0,
            lower: vec![0.0],
            upper: vec![1.0],
        }];
        assert!(matches!(
            assemble_bands("m".into(), &history(), &[], &[0.5, 0.5], &bands),
            Err(ForecastError::ModelFit(_))
        ));
    }
}
