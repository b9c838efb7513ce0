use serde::{Deserialize, Serialize};

use super::YearMonth;
use crate::forecast::metrics::ForecastMetrics;

/// Lower/upper prediction bounds at one confidence level (percent, e.g. 80.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalBound {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

/// One forecast horizon step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub period: YearMonth,
    pub point: f64,
    pub intervals: Vec<IntervalBound>,
}

impl ForecastRow {
    pub fn interval(&self, level: f64) -> Option<&IntervalBound> {
        self.intervals
            .iter()
            .find(|b| (b.level - level).abs() < 1e-9)
    }
}

/// Result of one model run: the model identifier plus `horizon` rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub model: String,
    pub series: String,
    pub rows: Vec<ForecastRow>,
    /// In-sample accuracy of the fitted model, when it could be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<ForecastMetrics>,
}

impl ForecastResult {
    pub fn new(model: impl Into<String>, series: impl Into<String>, rows: Vec<ForecastRow>) -> Self {
        Self {
            model: model.into(),
            series: series.into(),
            rows,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: Option<ForecastMetrics>) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn points(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.point).collect()
    }

    pub fn periods(&self) -> Vec<YearMonth> {
        self.rows.iter().map(|r| r.period).collect()
    }

    /// Confidence levels present in the result
    pub fn levels(&self) -> Vec<f64> {
        self.rows
            .first()
            .map(|r| r.intervals.iter().map(|b| b.level).collect())
            .unwrap_or_default()
    }

    /// True when every bound brackets its point forecast
    pub fn bounds_are_ordered(&self) -> bool {
        self.rows.iter().all(|r| {
            r.intervals
                .iter()
                .all(|b| b.lower <= r.point && r.point <= b.upper)
        })
    }
}
