//! Attention Gate
//!
//! Re-weights the nonzero entries of a structural operator. For an entry
//! (i, j) linking destination cell i to source cell j:
//!
//!   e_ij = LeakyReLU( a_dstᵀ h_i + a_srcᵀ h_j )     (= aᵀ [h_i ‖ h_j])
//!   α_ij = exp(e_ij) / Σ_{k ∈ N(i)} exp(e_ik)
//!
//! The α replace the operator's values in place of its sign/weight pattern,
//! so each nonempty row sums to one and empty rows stay empty. Nothing here
//! is random: the same inputs and parameters always give the same weights.

use ndarray::Array2;

use crate::complex::SparseOperator;
use crate::context::ComputeContext;
use crate::error::{ConvError, Result};

/// Default LeakyReLU slope for attention scores
pub const DEFAULT_NEGATIVE_SLOPE: f64 = 0.2;

/// Learned edge scoring for one operator
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionGate {
    /// Source half of the score vector, `[c_src, 1]`
    a_src: Array2<f64>,
    /// Destination half of the score vector, `[c_dst, 1]`
    a_dst: Array2<f64>,
    negative_slope: f64,
}

impl AttentionGate {
    pub fn new(
        src_channels: usize,
        dst_channels: usize,
        negative_slope: f64,
        ctx: &mut ComputeContext,
    ) -> Result<Self> {
        Ok(Self {
            a_src: ctx.weight(src_channels, 1)?,
            a_dst: ctx.weight(dst_channels, 1)?,
            negative_slope,
        })
    }

    /// Gate with explicit score vectors
    pub fn from_parts(a_src: Array2<f64>, a_dst: Array2<f64>, negative_slope: f64) -> Result<Self> {
        if a_src.ncols() != 1 || a_dst.ncols() != 1 {
            return Err(ConvError::config("attention score vectors must be single columns"));
        }
        Ok(Self { a_src, a_dst, negative_slope })
    }

    pub fn negative_slope(&self) -> f64 {
        self.negative_slope
    }

    pub(crate) fn params(&self) -> [&Array2<f64>; 2] {
        [&self.a_src, &self.a_dst]
    }

    pub(crate) fn params_mut(&mut self) -> [&mut Array2<f64>; 2] {
        [&mut self.a_src, &mut self.a_dst]
    }

    fn leaky(&self, x: f64) -> f64 {
        if x < 0.0 {
            self.negative_slope * x
        } else {
            x
        }
    }

    /// Attention-weighted copy of `op` (same pattern, row-stochastic values).
    ///
    /// `x_src` lives on the operator's column cells, `x_dst` on its row cells.
    pub fn weigh(
        &self,
        op: &SparseOperator,
        x_src: &Array2<f64>,
        x_dst: &Array2<f64>,
    ) -> Result<SparseOperator> {
        if x_src.nrows() != op.ncols() {
            return Err(ConvError::shape("attention source cells", op.ncols(), x_src.nrows()));
        }
        if x_dst.nrows() != op.nrows() {
            return Err(ConvError::shape("attention destination cells", op.nrows(), x_dst.nrows()));
        }
        if x_src.ncols() != self.a_src.nrows() {
            return Err(ConvError::shape("attention source channels", self.a_src.nrows(), x_src.ncols()));
        }
        if x_dst.ncols() != self.a_dst.nrows() {
            return Err(ConvError::shape(
                "attention destination channels",
                self.a_dst.nrows(),
                x_dst.ncols(),
            ));
        }

        let s_src = x_src.dot(&self.a_src);
        let s_dst = x_dst.dot(&self.a_dst);

        let mut values = Vec::with_capacity(op.nnz());
        for i in 0..op.nrows() {
            let scores: Vec<f64> = op
                .row(i)
                .map(|(j, _)| self.leaky(s_dst[[i, 0]] + s_src[[j, 0]]))
                .collect();
            values.extend(row_softmax(&scores));
        }
        op.with_values(values)
    }
}

/// Numerically stable softmax of one row; an empty row stays empty
fn row_softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
