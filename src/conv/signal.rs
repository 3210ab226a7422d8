//! Per-rank signals.
//!
//! A signal on rank r is an `n_r × channels` matrix. Layers never mutate
//! their input signals; each stage builds a fresh table.

use ndarray::Array2;

use crate::complex::{OperatorSet, RankTable};
use crate::error::{ConvError, Result};

/// One dense feature matrix per rank
pub type Signals = RankTable<Array2<f64>>;

/// Fetch the signal on `rank` and check it has `n_rank` rows and, when
/// given, the expected channel width.
pub fn signal_on<'a>(
    signals: &'a Signals,
    rank: usize,
    ops: &OperatorSet,
    channels: Option<usize>,
) -> Result<&'a Array2<f64>> {
    let x = signals.get(rank).ok_or(ConvError::MissingSignal(rank))?;
    let n = ops.n_cells(rank)?;
    if x.nrows() != n {
        return Err(ConvError::shape(format!("signal rows on rank {rank}"), n, x.nrows()));
    }
    if let Some(c) = channels {
        if x.ncols() != c {
            return Err(ConvError::shape(format!("signal channels on rank {rank}"), c, x.ncols()));
        }
    }
    Ok(x)
}
