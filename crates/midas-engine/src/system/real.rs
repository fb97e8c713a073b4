use std::{
    env, fs,
    io::Read,
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, trace};

use super::{ProcessSpec, SystemOps};
use crate::{Error, Result};

/// How often a blocking run checks whether its child has exited.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// [`SystemOps`] backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSystem;

impl RealSystem {
    /// Create the real system seam.
    pub fn new() -> Self {
        Self
    }
}

/// Build a `Command` from a spec. Stdin is always closed.
fn command(spec: &ProcessSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null());
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    if spec.quiet {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    cmd
}

/// Wait for `child` on a background thread so it never lingers as a zombie.
fn reap(mut child: Child, program: String) {
    thread::spawn(move || match child.wait() {
        Ok(status) if !status.success() => {
            debug!(program = %program, %status, "background process failed");
        }
        Ok(_) => trace!(program = %program, "background process finished"),
        Err(e) => debug!(program = %program, error = %e, "failed to wait for background process"),
    });
}

/// Poll `child` until it exits or `timeout` elapses; on timeout it is killed.
fn wait_with_timeout(child: &mut Child, program: &str, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                debug!(program, error = %e, "failed to kill timed out process");
            }
            child.wait().ok();
            return Err(Error::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Map a non-zero exit into an error.
fn check_status(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::ExitStatus {
            program: program.to_string(),
            status: status.to_string(),
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file())
}

impl SystemOps for RealSystem {
    fn which(&self, program: &str) -> bool {
        if program.is_empty() {
            return false;
        }
        if program.contains('/') {
            return is_executable(Path::new(program));
        }
        env::var_os("PATH").is_some_and(|paths| {
            env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
        })
    }

    fn spawn(&self, spec: &ProcessSpec) -> Result<()> {
        info!(command = %spec, "spawning process");
        let child = command(spec).spawn()?;
        reap(child, spec.program.clone());
        Ok(())
    }

    fn run(&self, spec: &ProcessSpec, timeout: Duration) -> Result<()> {
        info!(command = %spec, "running process");
        let mut child = command(spec).spawn()?;
        let status = wait_with_timeout(&mut child, &spec.program, timeout)?;
        check_status(&spec.program, status)
    }

    fn spawn_pipeline(&self, producer: &ProcessSpec, consumer: &ProcessSpec) -> Result<()> {
        info!(producer = %producer, consumer = %consumer, "spawning pipeline");
        let mut upstream = command(producer).stdout(Stdio::piped()).spawn()?;
        let Some(pipe) = upstream.stdout.take() else {
            upstream.kill().ok();
            reap(upstream, producer.program.clone());
            return Err(Error::Msg(format!("{} produced no stdout pipe", producer.program)));
        };
        let downstream = match command(consumer).stdin(Stdio::from(pipe)).spawn() {
            Ok(child) => child,
            Err(e) => {
                upstream.kill().ok();
                reap(upstream, producer.program.clone());
                return Err(e.into());
            }
        };
        reap(upstream, producer.program.clone());
        reap(downstream, consumer.program.clone());
        Ok(())
    }

    fn capture(&self, spec: &ProcessSpec, timeout: Duration) -> Result<String> {
        debug!(command = %spec, "capturing process output");
        let mut child = command(spec)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Msg(format!("{} produced no stdout pipe", spec.program)))?;
        let reader = thread::spawn(move || {
            let mut out = String::new();
            stdout.read_to_string(&mut out).map(|_| out)
        });
        let status = wait_with_timeout(&mut child, &spec.program, timeout)?;
        let out = reader
            .join()
            .map_err(|_| Error::Msg(format!("reader for {} panicked", spec.program)))??;
        check_status(&spec.program, status)?;
        Ok(out)
    }
}
