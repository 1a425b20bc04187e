//! Packaging error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from signing and packaging tools.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// Input file does not exist.
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Nothing to sign or package.
    #[error("no input files given")]
    NoInputs,

    /// The external tool is not installed.
    #[error("{tool} not found")]
    ToolNotFound { tool: PathBuf },

    /// The external tool exited with failure.
    #[error("{tool} failed ({status}): {output}")]
    ToolFailed {
        tool: String,
        status: String,
        output: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
