//! Error types for functional data analysis operations.
//!
//! Every fallible operation in this crate reports a typed [`FdaError`]
//! carrying the offending dimensions or values, so a caller can diagnose
//! a failure without re-running the computation.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FdaError>;

/// Typed failure raised by the numerical core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FdaError {
    /// An evaluation point fell outside the basis range, or a grid did not
    /// match the domain it was used against.
    #[error("domain error: {message} (value {value}, valid range [{lo}, {hi}])")]
    Domain {
        message: String,
        value: f64,
        lo: f64,
        hi: f64,
    },

    /// Mismatched N/M/K dimensions between curves, bases, or responses.
    #[error("dimension mismatch: {message} (expected {expected}, got {got})")]
    Dimension {
        message: String,
        expected: usize,
        got: usize,
    },

    /// A factorization or eigen-decomposition failed, or a requested rank
    /// exceeds what the data supports.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Invalid configuration: basis parameters, penalty order, lambda grid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FdaError {
    /// Shorthand for a [`FdaError::Dimension`] with a formatted message.
    pub fn dim(message: impl Into<String>, expected: usize, got: usize) -> Self {
        FdaError::Dimension {
            message: message.into(),
            expected,
            got,
        }
    }

    /// Shorthand for a [`FdaError::Domain`] with a formatted message.
    pub fn domain(message: impl Into<String>, value: f64, lo: f64, hi: f64) -> Self {
        FdaError::Domain {
            message: message.into(),
            value,
            lo,
            hi,
        }
    }
}
