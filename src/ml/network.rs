//! Single-hidden-layer feed-forward network: sigmoid hidden units, linear
//! output, trained by full-batch gradient descent on squared error with
//! weight decay.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Initial weights are drawn from `U(-INIT_RANGE, INIT_RANGE)`
pub const INIT_RANGE: f64 = 0.7;

/// Training rows and their targets
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingDataset {
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(ForecastError::InvalidInput(format!(
                "feature and target count mismatch: {} features, {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some(width) = features.first().map(Vec::len) {
            if features.iter().any(|f| f.len() != width) {
                return Err(ForecastError::InvalidInput(
                    "feature rows have different widths".into(),
                ));
            }
        }
        Ok(Self { features, targets })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn width(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty on all weights
    pub decay: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1000,
            learning_rate: 0.1,
            decay: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    inputs: usize,
    hidden: usize,
    /// `hidden` rows of `inputs + 1` weights, bias last
    hidden_weights: Vec<f64>,
    /// `hidden + 1` output weights, bias last
    output_weights: Vec<f64>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Network {
    pub fn random<R: Rng>(inputs: usize, hidden: usize, rng: &mut R) -> Self {
        let mut draw = |len: usize| -> Vec<f64> {
            (0..len).map(|_| rng.gen_range(-INIT_RANGE..INIT_RANGE)).collect()
        };
        let hidden_weights = draw(hidden * (inputs + 1));
        let output_weights = draw(hidden + 1);
        Self {
            inputs,
            hidden,
            hidden_weights,
            output_weights,
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    fn activations(&self, x: &[f64]) -> Vec<f64> {
        let stride = self.inputs + 1;
        (0..self.hidden)
            .map(|j| {
                let w = &self.hidden_weights[j * stride..(j + 1) * stride];
                let z = x.iter().zip(w).map(|(xi, wi)| xi * wi).sum::<f64>() + w[self.inputs];
                sigmoid(z)
            })
            .collect()
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let h = self.activations(x);
        h.iter()
            .zip(&self.output_weights)
            .map(|(a, w)| a * w)
            .sum::<f64>()
            + self.output_weights[self.hidden]
    }

    /// Train in place and return the final mean squared error
    pub fn train(&mut self, data: &TrainingDataset, config: &TrainingConfig) -> Result<f64> {
        if data.is_empty() {
            return Err(ForecastError::insufficient("network training", 1, 0));
        }
        if data.width() != self.inputs {
            return Err(ForecastError::InvalidInput(format!(
                "network expects {} inputs, dataset has {}",
                self.inputs,
                data.width()
            )));
        }

        let n = data.len() as f64;
        let stride = self.inputs + 1;
        for _ in 0..config.epochs {
            let mut grad_hidden = vec![0.0; self.hidden_weights.len()];
            let mut grad_output = vec![0.0; self.output_weights.len()];

            for (x, target) in data.features.iter().zip(&data.targets) {
                let h = self.activations(x);
                let out = h
                    .iter()
                    .zip(&self.output_weights)
                    .map(|(a, w)| a * w)
                    .sum::<f64>()
                    + self.output_weights[self.hidden];
                let err = (out - target) / n;

                for j in 0..self.hidden {
                    grad_output[j] += err * h[j];
                    let delta = err * self.output_weights[j] * h[j] * (1.0 - h[j]);
                    for (i, xi) in x.iter().enumerate() {
                        grad_hidden[j * stride + i] += delta * xi;
                    }
                    grad_hidden[j * stride + self.inputs] += delta;
                }
                grad_output[self.hidden] += err;
            }

            for (w, g) in self.hidden_weights.iter_mut().zip(&grad_hidden) {
                *w -= config.learning_rate * (g + config.decay * *w);
            }
            for (w, g) in self.output_weights.iter_mut().zip(&grad_output) {
                *w -= config.learning_rate * (g + config.decay * *w);
            }
        }

        let mse = data
            .features
            .iter()
            .zip(&data.targets)
            .map(|(x, t)| (self.predict(x) - t).powi(2))
            .sum::<f64>()
            / n;
        if !mse.is_finite() {
            return Err(ForecastError::ModelFit("network training diverged".into()));
        }
        Ok(mse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_dataset_shape_checks() {
        assert!(TrainingDataset::new(vec![vec![1.0]], vec![]).is_err());
        assert!(TrainingDataset::new(vec![vec![1.0], vec![1.0, 2.0]], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_initial_weights_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = Network::random(4, 3, &mut rng);
        assert!(net
            .hidden_weights
            .iter()
            .chain(&net.output_weights)
            .all(|w| w.abs() <= INIT_RANGE));
        assert_eq!((net.inputs(), net.hidden()), (4, 3));
        assert_eq!(net.hidden_weights.len(), 15);
        assert_eq!(net.output_weights.len(), 4);
    }

    #[test]
    fn test_learns_linear_map() {
        // y = 0.8 x1 - 0.5 x2 on standardised-scale inputs
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let a = (i as f64 / 20.0) - 1.0;
                let b = ((i * 7 % 40) as f64 / 20.0) - 1.0;
                vec![a, b]
            })
            .collect();
        let targets: Vec<f64> = features.iter().map(|f| 0.8 * f[0] - 0.5 * f[1]).collect();
        let data = TrainingDataset::new(features, targets).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let mut net = Network::random(2, 3, &mut rng);
        let before = data
            .features
            .iter()
            .zip(&data.targets)
            .map(|(x, t)| (net.predict(x) - t).powi(2))
            .sum::<f64>()
            / data.len() as f64;
        let config = TrainingConfig {
            epochs: 3000,
            learning_rate: 0.2,
            decay: 0.0,
        };
        let after = net.train(&data, &config).unwrap();
        assert!(after < before);
        assert!(after < 0.05, "mse {after}");
    }

    #[test]
    fn test_width_mismatch() {
        let data = TrainingDataset::new(vec![vec![1.0, 2.0]], vec![1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = Network::random(3, 2, &mut rng);
        assert!(net.train(&data, &TrainingConfig::default()).is_err());
    }
}
