//! Exploratory views of a monthly series: seasonal subseries, a year × month
//! table and the STL decomposition. Nothing here feeds the forecasters; these
//! are the numbers the seasonal and decomposition charts are drawn from.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::path::Path;
use tracing::info;

use super::stl::{Stl, StlDecomposition};
use crate::domain::MonthlySeries;
use crate::error::Result;

/// Observations of one calendar month across years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalSubseries {
    /// Month of year (1-12)
    pub month: u32,
    /// `(year, value)` pairs in chronological order
    pub values: Vec<(i32, f64)>,
    pub mean: Option<f64>,
}

/// Year × month matrix; `None` where a year is only partially observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalTable {
    pub years: Vec<i32>,
    pub cells: Vec<[Option<f64>; 12]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exploration {
    pub series: String,
    pub subseries: Vec<SeasonalSubseries>,
    pub table: SeasonalTable,
    pub decomposition: StlDecomposition,
    pub trend_strength: f64,
    pub seasonal_strength: f64,
}

pub fn seasonal_subseries(series: &MonthlySeries) -> Vec<SeasonalSubseries> {
    let mut buckets: Vec<Vec<(i32, f64)>> = vec![Vec::new(); 12];
    for (i, v) in series.values.iter().enumerate() {
        let period = series.period_at(i);
        buckets[period.month0()].push((period.year(), *v));
    }
    buckets
        .into_iter()
        .enumerate()
        .map(|(m, values)| {
            let mean = (!values.is_empty()).then(|| values.iter().map(|(_, v)| *v).mean());
            SeasonalSubseries {
                month: m as u32 + 1,
                values,
                mean,
            }
        })
        .collect()
}

pub fn seasonal_table(series: &MonthlySeries) -> SeasonalTable {
    let mut years: Vec<i32> = Vec::new();
    let mut cells: Vec<[Option<f64>; 12]> = Vec::new();
    for (i, v) in series.values.iter().enumerate() {
        let period = series.period_at(i);
        if years.last() != Some(&period.year()) {
            years.push(period.year());
            cells.push([None; 12]);
        }
        if let Some(row) = cells.last_mut() {
            row[period.month0()] = Some(*v);
        }
    }
    SeasonalTable { years, cells }
}

/// Seasonal views plus an additive periodic STL decomposition.
///
/// Fails with `InsufficientData` below two full seasonal cycles.
pub fn explore(series: &MonthlySeries) -> Result<Exploration> {
    let decomposition = Stl::new(MonthlySeries::FREQUENCY).decompose(&series.values)?;
    let trend_strength = decomposition.trend_strength();
    let seasonal_strength = decomposition.seasonal_strength();
    info!(
        series = %series.name,
        trend_strength,
        seasonal_strength,
        "decomposed series"
    );
    Ok(Exploration {
        series: series.name.clone(),
        subseries: seasonal_subseries(series),
        table: seasonal_table(series),
        decomposition,
        trend_strength,
        seasonal_strength,
    })
}

/// Write `period;observed;trend;seasonal;remainder` rows for charting
pub fn write_decomposition_csv(
    series: &MonthlySeries,
    decomposition: &StlDecomposition,
    path: &Path,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record(["period", "observed", "trend", "seasonal", "remainder"])?;
    for i in 0..decomposition.observed.len() {
        writer.write_record([
            series.period_at(i).to_string(),
            format!("{:.4}", decomposition.observed[i]),
            format!("{:.4}", decomposition.trend[i]),
            format!("{:.4}", decomposition.seasonal[i]),
            format!("{:.4}", decomposition.remainder[i]),
        ])?;
    }
    writer.flush()?;
    info!(path = %path.display(), "wrote decomposition");
    Ok(())
}
