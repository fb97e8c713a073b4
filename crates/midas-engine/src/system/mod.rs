//! Seam between actions and the operating system.
//!
//! Every external effect (process spawn, volume call, key simulation, audio
//! playback) goes through [`SystemOps`]. [`RealSystem`] talks to the OS;
//! [`MockSystem`] records calls for tests.

use std::{fmt, path::PathBuf, time::Duration};

use crate::Result;

mod mock;
mod real;

pub use mock::{MockCall, MockSystem};
pub use real::RealSystem;

/// A process to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments, not including the program.
    pub args: Vec<String>,
    /// Extra environment on top of the inherited one.
    pub env: Vec<(String, String)>,
    /// Working directory; inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Discard stdout and stderr.
    pub quiet: bool,
}

impl ProcessSpec {
    /// Spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add one environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Discard output.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Value of environment variable `key` set on this spec.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Operating-system effects used by actions.
pub trait SystemOps: Send + Sync {
    /// True when `program` resolves to an executable on `PATH`.
    fn which(&self, program: &str) -> bool;

    /// Start a process and return immediately. The child is reaped in the background.
    fn spawn(&self, spec: &ProcessSpec) -> Result<()>;

    /// Run a process to completion, killing it after `timeout`. A non-zero
    /// exit status is an error.
    fn run(&self, spec: &ProcessSpec, timeout: Duration) -> Result<()>;

    /// Start `producer | consumer` and return immediately.
    fn spawn_pipeline(&self, producer: &ProcessSpec, consumer: &ProcessSpec) -> Result<()>;

    /// Run a process to completion and return its stdout.
    fn capture(&self, spec: &ProcessSpec, timeout: Duration) -> Result<String>;
}
