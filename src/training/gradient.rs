//! Central finite-difference gradients.
//!
//!   ∂L/∂w ≈ (L(w + h) - L(w - h)) / 2h
//!
//! Two loss evaluations per scalar weight, so only suitable for small
//! models; every weight is restored exactly after probing.

use ndarray::Array2;

use crate::error::{ConvError, Result};
use crate::params::Parameterized;

/// Default probe step
pub const DEFAULT_STEP: f64 = 1e-5;

fn set_weight<M: Parameterized>(model: &mut M, k: usize, idx: (usize, usize), value: f64) {
    if let Some(w) = model.parameters_mut().into_iter().nth(k) {
        w[idx] = value;
    }
}

/// Gradient of `loss` with respect to every parameter of `model`, in
/// `parameters()` order.
pub fn finite_difference<M, F>(model: &mut M, mut loss: F, step: f64) -> Result<Vec<Array2<f64>>>
where
    M: Parameterized,
    F: FnMut(&M) -> Result<f64>,
{
    if !(step.is_finite() && step > 0.0) {
        return Err(ConvError::config(format!("finite-difference step {step} must be positive")));
    }
    let shapes: Vec<(usize, usize)> = model.parameters().iter().map(|w| w.dim()).collect();
    let mut grads = Vec::with_capacity(shapes.len());

    for (k, &(rows, cols)) in shapes.iter().enumerate() {
        let mut g = Array2::zeros((rows, cols));
        for i in 0..rows {
            for j in 0..cols {
                let original = model.parameters()[k][[i, j]];
                set_weight(model, k, (i, j), original + step);
                let up = loss(model);
                set_weight(model, k, (i, j), original - step);
                let down = loss(model);
                set_weight(model, k, (i, j), original);
                g[[i, j]] = (up? - down?) / (2.0 * step);
            }
        }
        grads.push(g);
    }
    Ok(grads)
}
