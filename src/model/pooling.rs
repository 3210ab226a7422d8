//! Empty-safe reductions over the cells of one rank.
//!
//! A complex may have no cells of some rank (a graph has no faces, a
//! Vietoris-Rips lift at small ε has no triangles). Reducing such a rank
//! gives the zero vector of the right width instead of NaN.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reduction over cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    #[default]
    Mean,
    Max,
}

impl Pooling {
    /// Reduce an `n × c` matrix to a length-`c` vector
    pub fn reduce(&self, x: &Array2<f64>) -> Array1<f64> {
        match self {
            Pooling::Mean => empty_safe_mean(x),
            Pooling::Max => empty_safe_max(x),
        }
    }
}

/// Column means; zero vector when `x` has no rows
pub fn empty_safe_mean(x: &Array2<f64>) -> Array1<f64> {
    match x.mean_axis(Axis(0)) {
        Some(mean) if x.nrows() > 0 => mean,
        _ => {
            warn!(channels = x.ncols(), "mean over an empty rank, pooled to zero");
            Array1::zeros(x.ncols())
        }
    }
}

/// Column maxima; zero vector when `x` has no rows
pub fn empty_safe_max(x: &Array2<f64>) -> Array1<f64> {
    if x.nrows() == 0 {
        warn!(channels = x.ncols(), "max over an empty rank, pooled to zero");
        return Array1::zeros(x.ncols());
    }
    x.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mean_and_max() {
        let x = array![[1.0, -2.0], [3.0, 4.0]];
        assert_eq!(Pooling::Mean.reduce(&x), array![2.0, 1.0]);
        assert_eq!(Pooling::Max.reduce(&x), array![3.0, 4.0]);
    }

    #[test]
    fn test_empty_rank_is_zero_not_nan() {
        let empty = Array2::<f64>::zeros((0, 3));
        for pooling in [Pooling::Mean, Pooling::Max] {
            let v = pooling.reduce(&empty);
            assert_eq!(v, Array1::<f64>::zeros(3));
            assert!(v.iter().all(|x| x.is_finite()));
        }
    }
}
