//! CSV loader for the monthly energy table.
//!
//! The file is delimited text with a header row. Periods must arrive in a
//! strictly increasing, gap-free monthly sequence; anything else is rejected
//! with the offending line number.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use itertools::Itertools;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::domain::{EnergyTable, Measurement, Observation, YearMonth};
use crate::error::{ForecastError, Result};

/// Resolved header positions
struct Columns {
    date: usize,
    inverter_1: usize,
    inverter_2: usize,
    bought: usize,
    sold: usize,
}

pub struct Loader<'a> {
    config: &'a DataConfig,
}

impl<'a> Loader<'a> {
    pub fn new(config: &'a DataConfig) -> Self {
        Self { config }
    }

    pub fn load_from_path(&self, path: &Path) -> Result<EnergyTable> {
        let file = File::open(path)?;
        let table = self.load_from_reader(file)?;
        info!(path = %path.display(), rows = table.len(), start = %table.start(), "loaded energy table");
        Ok(table)
    }

    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<EnergyTable> {
        let delimiter = self
            .config
            .delimiter_byte()
            .map_err(|e| ForecastError::InvalidInput(e.to_string()))?;
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let columns = self.resolve_columns(&headers)?;

        let mut rows = Vec::new();
        let mut lines = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            rows.push(self.parse_row(&record, &columns, line)?);
            lines.push(line);
        }

        if rows.is_empty() {
            return Err(ForecastError::insufficient("energy table", 1, 0));
        }

        for ((prev, _), (row, line)) in rows.iter().zip(&lines).tuple_windows() {
            check_succession(prev.period, row.period, *line)?;
        }

        for m in [
            Measurement::ProductionInverter1,
            Measurement::ProductionInverter2,
            Measurement::EnergyBought,
            Measurement::EnergySold,
        ] {
            let missing = rows.iter().filter(|r| r.get(m).is_none()).count();
            if missing > 0 {
                debug!(column = %m, missing, "missing values");
            }
        }

        EnergyTable::new(rows)
    }

    fn resolve_columns(&self, headers: &StringRecord) -> Result<Columns> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ForecastError::parse(1, format!("missing column '{name}'")))
        };
        Ok(Columns {
            date: find(&self.config.date_column)?,
            inverter_1: find(&self.config.inverter_1_column)?,
            inverter_2: find(&self.config.inverter_2_column)?,
            bought: find(&self.config.bought_column)?,
            sold: find(&self.config.sold_column)?,
        })
    }

    fn parse_row(&self, record: &StringRecord, columns: &Columns, line: u64) -> Result<Observation> {
        let raw_date = record.get(columns.date).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw_date, &self.config.date_format).map_err(|e| {
            ForecastError::parse(line, format!("invalid date '{raw_date}': {e}"))
        })?;

        let cell = |idx: usize, name: &str| self.parse_number(record.get(idx).unwrap_or(""), name, line);

        Ok(Observation {
            period: YearMonth::from_date(date),
            production_inverter_1: cell(columns.inverter_1, &self.config.inverter_1_column)?,
            production_inverter_2: cell(columns.inverter_2, &self.config.inverter_2_column)?,
            energy_bought: cell(columns.bought, &self.config.bought_column)?,
            energy_sold: cell(columns.sold, &self.config.sold_column)?,
        })
    }

    fn parse_number(&self, raw: &str, column: &str, line: u64) -> Result<Option<f64>> {
        if self
            .config
            .na_tokens
            .iter()
            .any(|token| token.eq_ignore_ascii_case(raw))
        {
            return Ok(None);
        }
        let value: f64 = raw.replace(',', ".").parse().map_err(|_| {
            ForecastError::parse(line, format!("invalid number '{raw}' in column '{column}'"))
        })?;
        if !value.is_finite() {
            return Err(ForecastError::parse(
                line,
                format!("non-finite number '{raw}' in column '{column}'"),
            ));
        }
        Ok(Some(value))
    }
}

fn check_succession(prev: YearMonth, next: YearMonth, line: u64) -> Result<()> {
    let step = prev.months_until(&next);
    match step {
        1 => Ok(()),
        0 => Err(ForecastError::parse(line, format!("duplicate period {next}"))),
        s if s < 0 => Err(ForecastError::parse(
            line,
            format!("period {next} is out of order after {prev}"),
        )),
        s => Err(ForecastError::parse(
            line,
            format!("gap of {} month(s) between {prev} and {next}", s - 1),
        )),
    }
}
