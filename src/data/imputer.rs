//! Seasonal gap filling.
//!
//! A first guess comes from a least-squares fit of Fourier terms plus a
//! polynomial trend. A robust periodic STL of that guess supplies the seasonal
//! component; the seasonally adjusted series is linearly interpolated across
//! the gaps and the seasonal component is added back. Observed values are
//! never touched.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::Stl;
use crate::domain::{EnergyTable, Measurement, MonthlySeries};
use crate::error::{ForecastError, Result};

/// Maximum Fourier harmonics in the starting-point regression
const MAX_HARMONICS: usize = 5;
/// Maximum polynomial trend degree in the starting-point regression
const MAX_TREND_DEGREE: usize = 6;

/// The four raw measurement series after gap filling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedTable {
    pub production_inverter_1: MonthlySeries,
    pub production_inverter_2: MonthlySeries,
    pub energy_bought: MonthlySeries,
    pub energy_sold: MonthlySeries,
}

impl ImputedTable {
    pub fn get(&self, measurement: Measurement) -> &MonthlySeries {
        match measurement {
            Measurement::ProductionInverter1 => &self.production_inverter_1,
            Measurement::ProductionInverter2 => &self.production_inverter_2,
            Measurement::EnergyBought => &self.energy_bought,
            Measurement::EnergySold => &self.energy_sold,
        }
    }
}

/// Fill every measurement column of `table` independently
pub fn impute_table(table: &EnergyTable) -> Result<ImputedTable> {
    let fill = |m: Measurement| -> Result<MonthlySeries> {
        let column = table.column(m);
        let missing = column.iter().filter(|v| v.is_none()).count();
        let values = impute(&column, MonthlySeries::FREQUENCY)?;
        if missing > 0 {
            info!(column = %m, missing, "imputed missing values");
        }
        MonthlySeries::new(m.to_string(), table.start(), values)
    };
    Ok(ImputedTable {
        production_inverter_1: fill(Measurement::ProductionInverter1)?,
        production_inverter_2: fill(Measurement::ProductionInverter2)?,
        energy_bought: fill(Measurement::EnergyBought)?,
        energy_sold: fill(Measurement::EnergySold)?,
    })
}

/// Fill missing entries of a seasonal series with period `period`.
///
/// A complete input is returned as is, whatever its length.
pub fn impute(values: &[Option<f64>], period: usize) -> Result<Vec<f64>> {
    let observed: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();
    let n = values.len();

    if observed.len() == n {
        return Ok(observed.into_iter().map(|(_, x)| x).collect());
    }
    if n < 2 * period {
        return Err(ForecastError::insufficient("seasonal imputation", 2 * period, n));
    }
    if observed.len() < 2 {
        return Err(ForecastError::insufficient(
            "seasonal imputation (observed values)",
            2,
            observed.len(),
        ));
    }

    let guess = regression_fill(values, &observed, period)?;
    let seasonal = Stl::new(period).robust().decompose(&guess)?.seasonal;

    let adjusted: Vec<(usize, f64)> = observed.iter().map(|&(i, x)| (i, x - seasonal[i])).collect();
    let interpolated = interpolate(&adjusted, n);

    let filled = values
        .iter()
        .enumerate()
        .map(|(i, v)| v.unwrap_or(interpolated[i] + seasonal[i]))
        .collect();
    debug!(n, missing = n - observed.len(), "filled gaps");
    Ok(filled)
}

/// Observed values kept, gaps replaced by a Fourier + polynomial trend fit
fn regression_fill(values: &[Option<f64>], observed: &[(usize, f64)], period: usize) -> Result<Vec<f64>> {
    let n = values.len();
    let harmonics = (period / 2).min(MAX_HARMONICS);
    let degree = (n / 10).clamp(1, MAX_TREND_DEGREE);
    let scale = (n - 1).max(1) as f64;

    let features = |t: usize| -> Vec<f64> {
        let mut row = Vec::with_capacity(1 + degree + 2 * harmonics);
        let x = t as f64 / scale;
        for d in 0..=degree {
            row.push(x.powi(d as i32));
        }
        for k in 1..=harmonics {
            let angle = 2.0 * std::f64::consts::PI * k as f64 * t as f64 / period as f64;
            // Sine of the Nyquist harmonic is identically zero
            if 2 * k != period {
                row.push(angle.sin());
            }
            row.push(angle.cos());
        }
        row
    };

    let width = features(0).len();
    let design = DMatrix::from_fn(observed.len(), width, |r, c| features(observed[r].0)[c]);
    let target = DVector::from_iterator(observed.len(), observed.iter().map(|(_, x)| *x));
    let beta = design
        .svd(true, true)
        .solve(&target, 1e-10)
        .map_err(|e| ForecastError::ModelFit(format!("imputation regression failed: {e}")))?;

    Ok(values
        .iter()
        .enumerate()
        .map(|(t, v)| {
            v.unwrap_or_else(|| {
                features(t)
                    .iter()
                    .zip(beta.iter())
                    .map(|(a, b)| a * b)
                    .sum()
            })
        })
        .collect())
}

/// Linear interpolation over `0..n` through sorted `(index, value)` knots,
/// held constant beyond the first and last knot
fn interpolate(knots: &[(usize, f64)], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    let (first_i, first_v) = knots[0];
    let (last_i, last_v) = knots[knots.len() - 1];
    for (t, slot) in out.iter_mut().enumerate() {
        *slot = if t <= first_i {
            first_v
        } else if t >= last_i {
            last_v
        } else {
            let k = knots.partition_point(|(i, _)| *i <= t);
            let (i0, v0) = knots[k - 1];
            if i0 == t {
                v0
            } else {
                let (i1, v1) = knots[k];
                v0 + (v1 - v0) * (t - i0) as f64 / (i1 - i0) as f64
            }
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn seasonal(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 200.0 + 2.0 * i as f64 + 80.0 * (2.0 * PI * i as f64 / 12.0).sin())
            .collect()
    }

    #[test]
    fn test_complete_series_is_unchanged() {
        let y = seasonal(10);
        let input: Vec<Option<f64>> = y.iter().copied().map(Some).collect();
        assert_eq!(impute(&input, 12).unwrap(), y);
    }

    #[test]
    fn test_gap_is_filled_close_to_truth() {
        let truth = seasonal(48);
        let mut input: Vec<Option<f64>> = truth.iter().copied().map(Some).collect();
        for i in [5, 17, 18, 30] {
            input[i] = None;
        }
        let filled = impute(&input, 12).unwrap();
        assert_eq!(filled.len(), 48);
        for i in [5, 17, 18, 30] {
            assert!((filled[i] - truth[i]).abs() < 10.0, "{i}: {} vs {}", filled[i], truth[i]);
        }
    }

    #[test]
    fn test_leading_and_trailing_gaps() {
        let truth = seasonal(36);
        let mut input: Vec<Option<f64>> = truth.iter().copied().map(Some).collect();
        input[0] = None;
        input[35] = None;
        let filled = impute(&input, 12).unwrap();
        assert!(filled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_short_series_with_gaps_is_rejected() {
        let mut input: Vec<Option<f64>> = seasonal(20).into_iter().map(Some).collect();
        input[3] = None;
        assert!(matches!(
            impute(&input, 12),
            Err(ForecastError::InsufficientData { needed: 24, got: 20, .. })
        ));
    }

    #[test]
    fn test_nearly_empty_series_is_rejected() {
        let mut input = vec![None; 30];
        input[4] = Some(1.0);
        assert!(matches!(
            impute(&input, 12),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_interpolate_holds_ends() {
        let knots = [(2, 1.0), (4, 3.0)];
        assert_eq!(interpolate(&knots, 7), vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    proptest! {
        #[test]
        fn prop_observed_values_preserved_and_idempotent(
            gaps in proptest::collection::vec(any::<bool>(), 36),
            noise in proptest::collection::vec(-5.0f64..5.0, 36),
        ) {
            let truth: Vec<f64> = seasonal(36).iter().zip(&noise).map(|(a, b)| a + b).collect();
            let mut input: Vec<Option<f64>> = truth
                .iter()
                .zip(&gaps)
                .map(|(v, gap)| if *gap { None } else { Some(*v) })
                .collect();
            // Keep enough observations to anchor the fit
            for slot in input.iter_mut().step_by(3) {
                if slot.is_none() {
                    *slot = Some(0.0);
                }
            }

            let filled = impute(&input, 12).unwrap();
            prop_assert_eq!(filled.len(), input.len());
            for (v, f) in input.iter().zip(&filled) {
                prop_assert!(f.is_finite());
                if let Some(x) = v {
                    prop_assert_eq!(x.to_bits(), f.to_bits());
                }
            }

            let again: Vec<Option<f64>> = filled.iter().copied().map(Some).collect();
            prop_assert_eq!(impute(&again, 12).unwrap(), filled);
        }
    }
}
