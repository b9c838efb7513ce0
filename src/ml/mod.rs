//! Neural-network autoregression.
//!
//! - `network`: single-hidden-layer feed-forward net trained by gradient descent
//! - `nnar`: NNAR(p,P,k) ensemble forecaster with an optional exogenous regressor

use serde::{Deserialize, Serialize};

pub mod network;
pub mod nnar;

pub use network::*;
pub use nnar::*;

/// Z-score standardisation fitted on one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: f64,
    pub std_dev: f64,
}

impl Scaler {
    pub fn fit(values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = var.sqrt();
        Self {
            mean,
            // A constant series is only centred
            std_dev: if std_dev < 1e-10 { 1.0 } else { std_dev },
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.transform(*v)).collect()
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.std_dev + self.mean
    }
}
