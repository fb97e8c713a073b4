use std::{io, result::Result as StdResult, time::Duration};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the Midas engine.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure while performing a system operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An external program ran but reported failure.
    #[error("{program} exited with {status}")]
    ExitStatus {
        /// Program name.
        program: String,
        /// Exit status as reported by the OS.
        status: String,
    },

    /// An external program did not finish in time and was killed.
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        /// Program name.
        program: String,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// A script failed to compile or run.
    #[error("Script error: {0}")]
    Script(String),

    /// The dispatch thread has stopped.
    #[error("Dispatcher stopped")]
    ChannelClosed,

    /// Generic error with context.
    #[error("Engine error: {0}")]
    Msg(String),
}

impl From<Box<rhai::EvalAltResult>> for Error {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        Self::Script(err.to_string())
    }
}

impl From<rhai::ParseError> for Error {
    fn from(err: rhai::ParseError) -> Self {
        Self::Script(err.to_string())
    }
}
