//! Polynomial Same-Rank Filter
//!
//! Given a same-rank operator L (adjacency, down or up Laplacian) and a
//! signal H on that rank, computes
//!
//!   H' = Σ_{p=min}^{max} (L^p H) W_p,     L^0 H = H
//!
//! Powers are built iteratively, X_p = L X_{p-1}, so only sparse × dense
//! products are ever formed and L^p is never materialised.
//!
//! With aggregation normalisation every step is followed by a row rescale
//! X_p ← D⁻¹ X_p where D is the neighborhood count of each row of L (rows
//! with no neighbors get factor 0 instead of ∞).

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::complex::SparseOperator;
use crate::error::{ConvError, Result};

/// Inclusive range of polynomial degrees `min..=max`, never inverted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct DegreeRange {
    min: usize,
    max: usize,
}

#[derive(Deserialize)]
struct RawRange {
    min: usize,
    max: usize,
}

impl TryFrom<RawRange> for DegreeRange {
    type Error = ConvError;

    fn try_from(raw: RawRange) -> Result<Self> {
        DegreeRange::new(raw.min, raw.max)
    }
}

impl DegreeRange {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(ConvError::config(format!("empty degree range {min}..={max}")));
        }
        Ok(Self { min, max })
    }

    /// `0..=max`: identity plus `max` hops
    pub fn up_to(max: usize) -> Self {
        Self { min: 0, max }
    }

    /// `1..=max`: hops only, no identity term (`max` is clamped to 1)
    pub fn hops(max: usize) -> Self {
        Self { min: 1, max: max.max(1) }
    }

    /// Degree 0 alone: a plain linear term
    pub fn identity() -> Self {
        Self { min: 0, max: 0 }
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of weight matrices the range needs
    pub fn weight_count(&self) -> usize {
        self.max - self.min + 1
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.min..=self.max
    }
}

/// Row factors 1/deg(i), zero for rows with no neighbors
pub fn neighborhood_scaling(op: &SparseOperator) -> Array1<f64> {
    op.row_degrees()
        .into_iter()
        .map(|d| if d == 0 { 0.0 } else { 1.0 / d as f64 })
        .collect()
}

fn scale_rows(x: &mut Array2<f64>, factors: &Array1<f64>) {
    for (mut row, &s) in x.rows_mut().into_iter().zip(factors.iter()) {
        row *= s;
    }
}

/// Apply `Σ_p (L^p x) W_p` over `degrees`, `weights[k]` belonging to degree
/// `degrees.min() + k`.
pub fn polynomial_filter(
    x: &Array2<f64>,
    op: &SparseOperator,
    degrees: DegreeRange,
    weights: &[Array2<f64>],
    aggr_norm: bool,
) -> Result<Array2<f64>> {
    if op.nrows() != op.ncols() {
        return Err(ConvError::shape("polynomial filter operator (square)", op.nrows(), op.ncols()));
    }
    if op.ncols() != x.nrows() {
        return Err(ConvError::shape("polynomial filter input rows", op.ncols(), x.nrows()));
    }
    if weights.len() != degrees.weight_count() {
        return Err(ConvError::shape("polynomial filter weight count", degrees.weight_count(), weights.len()));
    }
    let out_channels = weights[0].ncols();
    for w in weights {
        if w.nrows() != x.ncols() {
            return Err(ConvError::shape("polynomial filter weight rows", x.ncols(), w.nrows()));
        }
        if w.ncols() != out_channels {
            return Err(ConvError::config("polynomial filter weights disagree on output width"));
        }
    }

    let factors = aggr_norm.then(|| neighborhood_scaling(op));
    let mut out = Array2::zeros((x.nrows(), out_channels));
    let mut power = x.to_owned();

    for p in 0..=degrees.max() {
        if p > 0 {
            power = op.matmul(&power)?;
            if let Some(f) = &factors {
                scale_rows(&mut power, f);
            }
        }
        if p >= degrees.min() {
            out += &power.dot(&weights[p - degrees.min()]);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_degree_zero_is_linear() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let l = SparseOperator::from_dense(array![[1.0, 1.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]].view());
        let w = array![[0.5], [-1.0]];
        let y = polynomial_filter(&x, &l, DegreeRange::identity(), &[w.clone()], false).unwrap();
        assert_eq!(y, x.dot(&w));
    }

    #[test]
    fn test_zero_operator_contributes_nothing() {
        let x = array![[1.0], [2.0]];
        let l = SparseOperator::zeros(2, 2);
        let w = vec![array![[3.0]], array![[3.0]]];
        let y = polynomial_filter(&x, &l, DegreeRange::hops(2), &w, false).unwrap();
        assert_eq!(y, Array2::<f64>::zeros((2, 1)));
    }

    #[test]
    fn test_powers_are_iterated() {
        let dense = array![[0.0, 1.0], [1.0, 1.0]];
        let l = SparseOperator::from_dense(dense.view());
        let x = array![[1.0], [2.0]];
        let w = vec![array![[1.0]], array![[1.0]], array![[1.0]]];
        let y = polynomial_filter(&x, &l, DegreeRange::up_to(2), &w, false).unwrap();
        let expected = &x + &dense.dot(&x) + &dense.dot(&dense).dot(&x);
        assert_abs_diff_eq!(y, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_aggregation_normalisation() {
        // node 2 is isolated: factor 0, no division error
        let l = SparseOperator::from_dense(array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]].view());
        let x = array![[2.0], [4.0], [8.0]];
        let y = polynomial_filter(&x, &l, DegreeRange::hops(1), &[array![[1.0]]], true).unwrap();
        assert_eq!(y, array![[4.0], [2.0], [0.0]]);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_rejects_mismatched_operator() {
        let x = Array2::<f64>::zeros((3, 1));
        let l = SparseOperator::identity(2);
        assert!(matches!(
            polynomial_filter(&x, &l, DegreeRange::identity(), &[array![[1.0]]], false),
            Err(ConvError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_degree_range() {
        assert!(DegreeRange::new(2, 1).is_err());
        assert_eq!(DegreeRange::up_to(3).weight_count(), 4);
        assert_eq!(DegreeRange::hops(3).weight_count(), 3);
    }

    #[test]
    fn test_inverted_range_is_rejected_on_load() {
        let err = serde_json::from_str::<DegreeRange>(r#"{"min":3,"max":1}"#);
        assert!(err.is_err());

        let range: DegreeRange = serde_json::from_str(r#"{"min":1,"max":3}"#).unwrap();
        assert_eq!((range.min(), range.max()), (1, 3));
        assert_eq!(serde_json::to_string(&range).unwrap(), r#"{"min":1,"max":3}"#);
    }
}
