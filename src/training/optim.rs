//! Plain stochastic gradient descent over [`Parameterized`] weights.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ConvError, Result};
use crate::params::Parameterized;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    pub learning_rate: f64,
    /// L2 penalty folded into the step
    #[serde(default)]
    pub weight_decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            weight_decay: 0.0,
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// `w ← w - lr (g + λ w)` for every parameter, gradients in
    /// `parameters()` order.
    pub fn step<M: Parameterized + ?Sized>(&self, model: &mut M, grads: &[Array2<f64>]) -> Result<()> {
        let params = model.parameters_mut();
        if params.len() != grads.len() {
            return Err(ConvError::shape("gradient count", params.len(), grads.len()));
        }
        for (k, (w, g)) in params.into_iter().zip(grads).enumerate() {
            if w.dim() != g.dim() {
                return Err(ConvError::shape(format!("gradient {k} elements"), w.len(), g.len()));
            }
            let decay = self.weight_decay;
            w.zip_mut_with(g, |w, &g| {
                let v = *w;
                *w = v - self.learning_rate * (g + decay * v);
            });
        }
        Ok(())
    }
}

impl Default for Sgd {
    fn default() -> Self {
        Self::new(0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ComputeContext, Initialization};
    use crate::model::Readout;
    use ndarray::array;

    #[test]
    fn test_step_moves_against_gradient() {
        let mut r = Readout::new(1, 1, &mut ComputeContext::new(0).with_init(Initialization::Zeros)).unwrap();
        Sgd::new(0.5)
            .step(&mut r, &[array![[2.0]], array![[-4.0]]])
            .unwrap();
        assert_eq!(r.parameters(), vec![&array![[-1.0]], &array![[2.0]]]);
    }

    #[test]
    fn test_gradient_shape_checked() {
        let mut r = Readout::new(2, 1, &mut ComputeContext::new(0)).unwrap();
        assert!(Sgd::default().step(&mut r, &[array![[1.0]]]).is_err());
        assert!(Sgd::default().step(&mut r, &[array![[1.0]], array![[1.0]]]).is_err());
    }
}
