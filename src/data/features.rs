//! Derived series: total production and net grid balance.

use serde::{Deserialize, Serialize};

use super::imputer::ImputedTable;
use crate::domain::MonthlySeries;

pub const TOTAL_PRODUCTION: &str = "total_production";
pub const BALANCE: &str = "balance";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSeries {
    /// Sum of both inverters
    pub total_production: MonthlySeries,
    /// Energy sold minus energy bought; positive when exporting
    pub balance: MonthlySeries,
}

/// Compute the derived series once, after imputation
pub fn derive(table: &ImputedTable) -> DerivedSeries {
    let start = table.production_inverter_1.start;
    DerivedSeries {
        total_production: MonthlySeries {
            name: TOTAL_PRODUCTION.into(),
            start,
            values: elementwise(
                &table.production_inverter_1.values,
                &table.production_inverter_2.values,
                |a, b| a + b,
            ),
        },
        balance: MonthlySeries {
            name: BALANCE.into(),
            start,
            values: elementwise(
                &table.energy_sold.values,
                &table.energy_bought.values,
                |sold, bought| sold - bought,
            ),
        },
    }
}

fn elementwise(a: &[f64], b: &[f64], op: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| op(*x, *y)).collect()
}
