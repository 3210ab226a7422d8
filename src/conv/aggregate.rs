//! Aggregator: sum of all contributions landing on one rank.

use ndarray::Array2;

use crate::error::{ConvError, Result};

/// Sum `contributions` into an `n_cells × out_channels` pre-activation.
///
/// No contribution at all gives the zero matrix. A contribution with the
/// wrong channel width is a configuration defect; one with the wrong row
/// count means the operators disagree with the complex.
pub fn aggregate<I>(n_cells: usize, out_channels: usize, contributions: I) -> Result<Array2<f64>>
where
    I: IntoIterator<Item = Array2<f64>>,
{
    let mut total = Array2::zeros((n_cells, out_channels));
    for term in contributions {
        if term.ncols() != out_channels {
            return Err(ConvError::config(format!(
                "term of width {} aggregated into a rank of width {out_channels}",
                term.ncols()
            )));
        }
        if term.nrows() != n_cells {
            return Err(ConvError::shape("aggregated term rows", n_cells, term.nrows()));
        }
        total += &term;
    }
    Ok(total)
}
