//! Learnable parameter access.
//!
//! Layers, readouts and models expose their weight matrices in a fixed
//! order so optimisers and gradient estimators can walk them without
//! knowing the concrete type.

use ndarray::Array2;

/// Anything that owns learnable weight matrices.
pub trait Parameterized {
    /// Weights in a stable order
    fn parameters(&self) -> Vec<&Array2<f64>>;

    /// Same order as [`Parameterized::parameters`]
    fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>>;

    /// Total scalar count
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|w| w.len()).sum()
    }
}
