//! Errors for reading and writing workspace files.

use std::{io, path::PathBuf, result};

use thiserror::Error;

/// Result alias for workspace operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors produced while loading or saving a workspace.
#[derive(Debug, Error)]
pub enum Error {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file is not a valid workspace document.
    #[error("invalid workspace {}:{line}:{column}: {message}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
        /// Parser message.
        message: String,
    },
    /// JSON encoding or decoding outside of a file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
