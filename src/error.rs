//! Error types for complex construction and higher-order convolution.
//!
//! Configuration errors are raised before any weight is allocated or any
//! signal is touched. Shape errors point at a defect in whoever supplied the
//! operators and signals. Numeric edge cases (empty ranks, zero operators)
//! are not errors at all.

use thiserror::Error;

/// Errors raised by the convolution engine and its operator provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvError {
    /// Invalid layer or model configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Operator or signal dimensions do not line up.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Where the mismatch was detected
        context: String,
        /// Expected extent
        expected: usize,
        /// Actual extent
        actual: usize,
    },

    /// A layer asked for an operator the operator set does not carry.
    #[error("operator {0} not present in operator set")]
    UnknownOperator(String),

    /// A layer needs a signal on a rank that was not supplied.
    #[error("no signal supplied for rank {0}")]
    MissingSignal(usize),

    /// Rank outside the complex.
    #[error("rank {rank} out of range (complex has ranks 0..={max_rank})")]
    InvalidRank {
        /// Requested rank
        rank: usize,
        /// Highest rank present
        max_rank: usize,
    },

    /// Malformed simplex or cell handed to a complex builder.
    #[error("invalid cell: {0}")]
    InvalidCell(String),
}

impl ConvError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ConvError::Config(msg.into())
    }

    pub(crate) fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        ConvError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ConvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvError::shape("polynomial filter", 3, 4);
        assert_eq!(
            err.to_string(),
            "shape mismatch in polynomial filter: expected 3, got 4"
        );

        let err = ConvError::InvalidRank { rank: 5, max_rank: 2 };
        assert_eq!(err.to_string(), "rank 5 out of range (complex has ranks 0..=2)");
    }
}
