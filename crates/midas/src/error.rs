//! Error handling for the midas binary.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for midas commands.
pub type Result<T> = result::Result<T, Error>;

/// Errors that end a midas command.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Workspace could not be loaded or saved.
    #[error("{0}")]
    Workspace(#[from] midas_workspace::Error),
    /// The dispatch engine failed.
    #[error("engine error: {0}")]
    Engine(#[from] midas_engine::Error),
    /// No built-in preset has this id.
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}
