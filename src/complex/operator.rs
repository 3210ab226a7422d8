//! Sparse Linear Operators Between Cell Sets
//!
//! Every structural operator (boundary, adjacency, Laplacian) is stored in
//! compressed sparse row form. An operator mapping rank `a` to rank `b` has
//! `n_b` rows and `n_a` columns; applying it to a signal on rank `a`
//! (`n_a × c`) yields a signal on rank `b` (`n_b × c`).
//!
//! Operators are immutable once built. Attention and normalisation produce
//! new operators that share the sparsity pattern of the original.

use ndarray::{Array1, Array2, ArrayView2};
use std::collections::BTreeMap;

use crate::error::{ConvError, Result};

/// Compressed sparse row matrix
#[derive(Debug, Clone, PartialEq)]
pub struct SparseOperator {
    n_rows: usize,
    n_cols: usize,
    /// Row `i` spans `indices[indptr[i]..indptr[i+1]]`
    indptr: Vec<usize>,
    /// Column indices, sorted within each row
    indices: Vec<usize>,
    /// Values parallel to `indices`
    values: Vec<f64>,
}

impl SparseOperator {
    /// Build from `(row, col, value)` triplets.
    ///
    /// Duplicate coordinates are summed and entries that sum to exactly zero
    /// are dropped, so the stored pattern is the true nonzero pattern.
    pub fn from_triplets<I>(n_rows: usize, n_cols: usize, triplets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n_rows];
        for (r, c, v) in triplets {
            if r >= n_rows {
                return Err(ConvError::shape("triplet row index", n_rows, r + 1));
            }
            if c >= n_cols {
                return Err(ConvError::shape("triplet column index", n_cols, c + 1));
            }
            *rows[r].entry(c).or_insert(0.0) += v;
        }

        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for row in rows {
            for (c, v) in row {
                if v != 0.0 {
                    indices.push(c);
                    values.push(v);
                }
            }
            indptr.push(indices.len());
        }

        Ok(Self { n_rows, n_cols, indptr, indices, values })
    }

    /// All-zero operator with no stored entries
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Identity on `n` cells
    pub fn identity(n: usize) -> Self {
        Self {
            n_rows: n,
            n_cols: n,
            indptr: (0..=n).collect(),
            indices: (0..n).collect(),
            values: vec![1.0; n],
        }
    }

    /// Sparsify a dense matrix (exact zeros are dropped)
    pub fn from_dense(dense: ArrayView2<'_, f64>) -> Self {
        let (n_rows, n_cols) = dense.dim();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for row in dense.rows() {
            for (c, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(c);
                    values.push(v);
                }
            }
            indptr.push(indices.len());
        }
        Self { n_rows, n_cols, indptr, indices, values }
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_rows, self.n_cols));
        for i in 0..self.n_rows {
            for (j, v) in self.row(i) {
                out[[i, j]] = v;
            }
        }
        out
    }

    pub fn nrows(&self) -> usize {
        self.n_rows
    }

    pub fn ncols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// True when no entry is stored (the operator contributes a zero term)
    pub fn is_zero(&self) -> bool {
        self.values.is_empty()
    }

    /// Stored values in row-major order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(column, value)` pairs of row `i`
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.indptr[i]..self.indptr[i + 1];
        self.indices[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }

    /// Iterate every stored `(row, column, value)`
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n_rows).flat_map(move |i| self.row(i).map(move |(j, v)| (i, j, v)))
    }

    /// Same sparsity pattern, new values (row-major, one per stored entry)
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.values.len() {
            return Err(ConvError::shape("operator value count", self.values.len(), values.len()));
        }
        Ok(Self {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            values,
        })
    }

    /// Elementwise map over stored values, pattern preserved
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.n_cols + 1];
        for &c in &self.indices {
            counts[c + 1] += 1;
        }
        for c in 0..self.n_cols {
            counts[c + 1] += counts[c];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0usize; self.nnz()];
        let mut values = vec![0.0; self.nnz()];
        // rows are visited in order, so columns of the transpose stay sorted
        for (i, j, v) in self.entries() {
            let slot = next[j];
            indices[slot] = i;
            values[slot] = v;
            next[j] += 1;
        }
        Self {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            indptr,
            indices,
            values,
        }
    }

    /// Sum of each row's stored values
    pub fn row_sums(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n_rows).map(|i| self.row(i).map(|(_, v)| v).sum::<f64>()))
    }

    /// Number of stored entries per row
    pub fn row_degrees(&self) -> Vec<usize> {
        self.indptr.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Sparse × dense product `self · x`
    pub fn matmul(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.nrows() != self.n_cols {
            return Err(ConvError::shape("sparse operator application", self.n_cols, x.nrows()));
        }
        let mut out = Array2::zeros((self.n_rows, x.ncols()));
        for i in 0..self.n_rows {
            let mut out_row = out.row_mut(i);
            for (j, v) in self.row(i) {
                out_row.scaled_add(v, &x.row(j));
            }
        }
        Ok(out)
    }

    /// Sparse × sparse product `self · other`
    pub fn compose(&self, other: &SparseOperator) -> Result<SparseOperator> {
        if other.n_rows != self.n_cols {
            return Err(ConvError::shape("sparse operator composition", self.n_cols, other.n_rows));
        }
        let mut triplets = Vec::new();
        for i in 0..self.n_rows {
            let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
            for (k, a) in self.row(i) {
                for (j, b) in other.row(k) {
                    *acc.entry(j).or_insert(0.0) += a * b;
                }
            }
            triplets.extend(acc.into_iter().map(|(j, v)| (i, j, v)));
        }
        SparseOperator::from_triplets(self.n_rows, other.n_cols, triplets)
    }

    /// Entrywise sum of two operators of equal shape
    pub fn add(&self, other: &SparseOperator) -> Result<SparseOperator> {
        if self.n_rows != other.n_rows {
            return Err(ConvError::shape("operator sum rows", self.n_rows, other.n_rows));
        }
        if self.n_cols != other.n_cols {
            return Err(ConvError::shape("operator sum columns", self.n_cols, other.n_cols));
        }
        SparseOperator::from_triplets(
            self.n_rows,
            self.n_cols,
            self.entries().chain(other.entries()),
        )
    }

    /// Multiply row `i` by `factors[i]`
    pub fn scale_rows(&self, factors: &Array1<f64>) -> Result<SparseOperator> {
        if factors.len() != self.n_rows {
            return Err(ConvError::shape("row scaling", self.n_rows, factors.len()));
        }
        let values = self.entries().map(|(i, _, v)| v * factors[i]).collect();
        self.with_values(values)
    }

    /// Relabel cells: row `i` moves to `row_perm[i]`, column `j` to `col_perm[j]`.
    pub fn permuted(&self, row_perm: &[usize], col_perm: &[usize]) -> Result<SparseOperator> {
        if row_perm.len() != self.n_rows {
            return Err(ConvError::shape("row permutation", self.n_rows, row_perm.len()));
        }
        if col_perm.len() != self.n_cols {
            return Err(ConvError::shape("column permutation", self.n_cols, col_perm.len()));
        }
        SparseOperator::from_triplets(
            self.n_rows,
            self.n_cols,
            self.entries().map(|(i, j, v)| (row_perm[i], col_perm[j], v)),
        )
    }
}
