//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for migsurf operations
#[derive(Error, Debug)]
pub enum MigsurfError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse errors in line-delimited input files
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Configuration errors (invalid CLI arguments, out-of-range parameters)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path:?}")]
    FileNotFound { path: PathBuf },

    /// Numerical errors (non-finite likelihood, Pade LU failure,
    /// Krylov breakdown, negative expected sharing)
    #[error("Numerical error: {message}")]
    Numeric { message: String },

    /// Invariant violations (tracked log-likelihood drifted from a
    /// from-scratch recomputation)
    #[error("Invariant violation: {message}")]
    Invariant { message: String },
}

/// Type alias for Results using MigsurfError
pub type Result<T> = std::result::Result<T, MigsurfError>;

impl MigsurfError {
    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a numerical error
    pub fn numeric(message: impl Into<String>) -> Self {
        Self::Numeric {
            message: message.into(),
        }
    }

    /// Create an invariant-violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Whether the error is proposal-local: the offending move is rejected
    /// and the chain continues, rather than aborting the run.
    pub fn is_proposal_local(&self) -> bool {
        matches!(self, Self::Numeric { .. })
    }
}
