//! Training Glue
//!
//! Just enough to fit small models end to end: losses, SGD over
//! [`Parameterized`](crate::params::Parameterized) weights, central finite
//! differences as the gradient source, and a seeded split.

mod gradient;
mod loss;
mod optim;
mod split;

pub use gradient::{finite_difference, DEFAULT_STEP};
pub use loss::{cell_cross_entropy, mse, softmax_cross_entropy};
pub use optim::Sgd;
pub use split::train_test_split;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::params::Parameterized;

/// Training loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    #[serde(default)]
    pub weight_decay: f64,
    /// Finite-difference probe step
    pub fd_step: f64,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            learning_rate: 0.05,
            weight_decay: 0.0,
            fd_step: DEFAULT_STEP,
            test_fraction: 0.25,
            seed: 42,
        }
    }
}

impl TrainConfig {
    pub fn optimizer(&self) -> Sgd {
        Sgd::new(self.learning_rate).with_weight_decay(self.weight_decay)
    }
}

/// One gradient step on `loss`; returns the loss before the step.
pub fn train_step<M, F>(model: &mut M, mut loss: F, optimizer: &Sgd, fd_step: f64) -> Result<f64>
where
    M: Parameterized,
    F: FnMut(&M) -> Result<f64>,
{
    let before = loss(model)?;
    let grads = finite_difference(model, &mut loss, fd_step)?;
    optimizer.step(model, &grads)?;
    debug!(loss = before, parameters = model.num_parameters(), "train step");
    Ok(before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ComputeContext;
    use crate::model::Readout;
    use ndarray::array;

    #[test]
    fn test_default_config() {
        let config = TrainConfig::default();
        assert_eq!(config.epochs, 20);
        assert_eq!(config.optimizer().learning_rate, 0.05);
    }

    #[test]
    fn test_steps_reduce_loss() {
        let mut r = Readout::new(2, 1, &mut ComputeContext::new(7)).unwrap();
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let y = array![1.0, -1.0, 0.0];
        let loss = |m: &Readout| mse(m.apply(&x)?.column(0), y.view());

        let sgd = Sgd::new(0.3);
        let first = train_step(&mut r, loss, &sgd, DEFAULT_STEP).unwrap();
        let mut last = first;
        for _ in 0..200 {
            last = train_step(&mut r, loss, &sgd, DEFAULT_STEP).unwrap();
        }
        assert!(last < first);
        assert!(last < 1e-2);
    }
}
