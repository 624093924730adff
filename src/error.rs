//! Error types for sparsejit

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using sparsejit's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparsejit operations
#[derive(Error, Debug)]
pub enum Error {
    /// An allocation failed. Always aborts the current operation.
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// The requested problem cannot take this path (opaque user type,
    /// JIT disabled, device declined). Callers fall back to the generic path.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Writing the kernel source or running the external compiler failed
    #[error("Failed to compile kernel '{kernel}': {reason}")]
    Compile {
        /// Kernel name
        kernel: String,
        /// Compiler diagnostic or I/O failure
        reason: String,
    },

    /// The compiled artifact could not be loaded
    #[error("Failed to load kernel library {path:?}: {reason}")]
    Load {
        /// Path of the shared library
        path: PathBuf,
        /// Loader diagnostic
        reason: String,
    },

    /// A loaded library lacks a required symbol
    #[error("Malformed kernel library {path:?}: missing symbol '{symbol}'")]
    MalformedArtifact {
        /// Path of the shared library
        path: PathBuf,
        /// The missing symbol
        symbol: String,
    },

    /// A matrix violates one of the descriptor invariants
    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),

    /// An element access outside the matrix
    #[error("Index ({row}, {col}) out of bounds for a {nrows}x{ncols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },

    /// Operand dimensions do not agree
    #[error("Dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        /// Expected (nrows, ncols)
        expected: (usize, usize),
        /// Actual (nrows, ncols)
        got: (usize, usize),
    },

    /// Filesystem error outside the compile step
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures the dispatch layer must propagate
    /// instead of falling back to the generic kernel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::OutOfMemory { .. })
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidMatrix(msg.into())
    }
}
