use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;

use super::{ProcessSpec, SystemOps};
use crate::{Error, Result};

/// One recorded call on a [`MockSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// Fire-and-forget spawn.
    Spawn(ProcessSpec),
    /// Blocking run.
    Run(ProcessSpec),
    /// Producer and consumer of a pipeline.
    Pipeline(ProcessSpec, ProcessSpec),
    /// Output capture.
    Capture(ProcessSpec),
}

impl MockCall {
    /// The (first) process of the call.
    pub fn spec(&self) -> &ProcessSpec {
        match self {
            Self::Spawn(s) | Self::Run(s) | Self::Capture(s) | Self::Pipeline(s, _) => s,
        }
    }
}

/// In-memory [`SystemOps`] for tests.
///
/// Programs are unavailable until marked with [`MockSystem::set_available`].
/// Calls are recorded whether or not they are configured to fail.
#[derive(Clone, Default)]
pub struct MockSystem {
    calls: Arc<Mutex<Vec<MockCall>>>,
    available: Arc<Mutex<HashSet<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    outputs: Arc<Mutex<HashMap<String, String>>>,
    which_queries: Arc<Mutex<Vec<String>>>,
}

impl MockSystem {
    /// A mock where no program exists.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock where each of `programs` exists.
    pub fn with_programs(programs: &[&str]) -> Self {
        let mock = Self::new();
        for p in programs {
            mock.set_available(p, true);
        }
        mock
    }

    /// Mark `program` as installed or not.
    pub fn set_available(&self, program: &str, available: bool) {
        let mut g = self.available.lock();
        if available {
            g.insert(program.to_string());
        } else {
            g.remove(program);
        }
    }

    /// Make every call starting `program` fail.
    pub fn set_fail(&self, program: &str, fail: bool) {
        let mut g = self.failing.lock();
        if fail {
            g.insert(program.to_string());
        } else {
            g.remove(program);
        }
    }

    /// Output returned by [`SystemOps::capture`] for a full command line.
    pub fn set_output(&self, command_line: &str, output: &str) {
        self.outputs
            .lock()
            .insert(command_line.to_string(), output.to_string());
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Command lines of every call so far (pipelines as `a | b`).
    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| match c {
                MockCall::Pipeline(p, q) => format!("{p} | {q}"),
                other => other.spec().to_string(),
            })
            .collect()
    }

    /// True when some call's command line equals `line`.
    pub fn calls_contains(&self, line: &str) -> bool {
        self.command_lines().iter().any(|l| l == line)
    }

    /// Programs asked about through [`SystemOps::which`].
    pub fn which_queries(&self) -> Vec<String> {
        self.which_queries.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn note(&self, call: MockCall) -> Result<()> {
        let program = call.spec().program.clone();
        let failing = {
            let f = self.failing.lock();
            match &call {
                MockCall::Pipeline(p, q) => f.contains(&p.program) || f.contains(&q.program),
                _ => f.contains(&program),
            }
        };
        self.calls.lock().push(call);
        if failing {
            return Err(Error::ExitStatus {
                program,
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

impl SystemOps for MockSystem {
    fn which(&self, program: &str) -> bool {
        self.which_queries.lock().push(program.to_string());
        self.available.lock().contains(program)
    }

    fn spawn(&self, spec: &ProcessSpec) -> Result<()> {
        self.note(MockCall::Spawn(spec.clone()))
    }

    fn run(&self, spec: &ProcessSpec, _timeout: Duration) -> Result<()> {
        self.note(MockCall::Run(spec.clone()))
    }

    fn spawn_pipeline(&self, producer: &ProcessSpec, consumer: &ProcessSpec) -> Result<()> {
        self.note(MockCall::Pipeline(producer.clone(), consumer.clone()))
    }

    fn capture(&self, spec: &ProcessSpec, _timeout: Duration) -> Result<String> {
        self.note(MockCall::Capture(spec.clone()))?;
        Ok(self
            .outputs
            .lock()
            .get(&spec.to_string())
            .cloned()
            .unwrap_or_default())
    }
}
