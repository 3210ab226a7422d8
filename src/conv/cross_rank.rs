//! Cross-Rank Lift/Project Filter
//!
//! Carries a signal from rank r to rank r±1 through an incidence operator:
//!
//!   H_dst = B · H_src · W
//!
//! `B` is a boundary (project down) or coboundary (lift up). When attention
//! is on, the caller swaps `B` for its attention-weighted copy first; the
//! sparsity pattern, and therefore this function, is unchanged.

use ndarray::Array2;

use crate::complex::SparseOperator;
use crate::error::{ConvError, Result};

/// Move `x` across ranks without mixing channels: `B · x`
pub fn transport(x: &Array2<f64>, incidence: &SparseOperator) -> Result<Array2<f64>> {
    if incidence.ncols() != x.nrows() {
        return Err(ConvError::shape("cross-rank source rows", incidence.ncols(), x.nrows()));
    }
    incidence.matmul(x)
}

/// `B · x · W`
pub fn cross_rank_filter(
    x: &Array2<f64>,
    incidence: &SparseOperator,
    weight: &Array2<f64>,
) -> Result<Array2<f64>> {
    if weight.nrows() != x.ncols() {
        return Err(ConvError::shape("cross-rank weight rows", x.ncols(), weight.nrows()));
    }
    Ok(transport(x, incidence)?.dot(weight))
}
