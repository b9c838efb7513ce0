use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::YearMonth;
use crate::error::{ForecastError, Result};

/// Raw measurement columns of the monthly energy table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    #[strum(serialize = "production_inverter_1")]
    ProductionInverter1,
    #[strum(serialize = "production_inverter_2")]
    ProductionInverter2,
    #[strum(serialize = "energy_bought")]
    EnergyBought,
    #[strum(serialize = "energy_sold")]
    EnergySold,
}

/// One month of raw measurements. Any measurement may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub period: YearMonth,
    pub production_inverter_1: Option<f64>,
    pub production_inverter_2: Option<f64>,
    pub energy_bought: Option<f64>,
    pub energy_sold: Option<f64>,
}

impl Observation {
    pub fn get(&self, measurement: Measurement) -> Option<f64> {
        match measurement {
            Measurement::ProductionInverter1 => self.production_inverter_1,
            Measurement::ProductionInverter2 => self.production_inverter_2,
            Measurement::EnergyBought => self.energy_bought,
            Measurement::EnergySold => self.energy_sold,
        }
    }
}

/// Ordered table of monthly observations.
///
/// Periods are strictly increasing by exactly one month; the loader rejects
/// anything else, and `new` re-checks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyTable {
    rows: Vec<Observation>,
}

impl EnergyTable {
    pub fn new(rows: Vec<Observation>) -> Result<Self> {
        if rows.is_empty() {
            return Err(ForecastError::insufficient("energy table", 1, 0));
        }
        for (i, pair) in rows.windows(2).enumerate() {
            if pair[0].period.succ() != pair[1].period {
                return Err(ForecastError::parse(
                    i as u64 + 2,
                    format!(
                        "periods must form a gap-free increasing monthly sequence: {} followed by {}",
                        pair[0].period, pair[1].period
                    ),
                ));
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn start(&self) -> YearMonth {
        self.rows[0].period
    }

    /// Values of one measurement column in period order
    pub fn column(&self, measurement: Measurement) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(measurement)).collect()
    }

    pub fn missing_count(&self, measurement: Measurement) -> usize {
        self.rows.iter().filter(|r| r.get(measurement).is_none()).count()
    }
}

/// Regular monthly series without gaps or missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub name: String,
    pub start: YearMonth,
    pub values: Vec<f64>,
}

impl MonthlySeries {
    /// Seasonal period of monthly data
    pub const FREQUENCY: usize = 12;

    pub fn new(name: impl Into<String>, start: YearMonth, values: Vec<f64>) -> Result<Self> {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidInput(format!(
                "series contains a non-finite value at {}",
                start.add_months(i as i64)
            )));
        }
        Ok(Self {
            name: name.into(),
            start,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn period_at(&self, index: usize) -> YearMonth {
        self.start.add_months(index as i64)
    }

    /// First period after the last observation
    pub fn next_period(&self) -> YearMonth {
        self.period_at(self.values.len())
    }

    /// Periods of the `horizon` months following the series
    pub fn future_periods(&self, horizon: usize) -> Vec<YearMonth> {
        (0..horizon).map(|h| self.period_at(self.values.len() + h)).collect()
    }
}
