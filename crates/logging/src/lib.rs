#![warn(missing_docs)]

//! Logging setup shared by the Midas binaries.
//!
//! Provides the `--trace`/`--debug`/`--log-level`/`--log-filter` CLI flags and
//! turns them into a `tracing_subscriber` filter scoped to our crates, so
//! dependency noise stays out of the log unless asked for.

use std::env;

use clap::Args;
use tracing_subscriber::EnvFilter;

/// Logging controls for CLI apps.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Set global log level to trace (our crates only)
    #[arg(long, global = true, conflicts_with_all = ["debug", "log_level", "log_filter"])]
    pub trace: bool,

    /// Set global log level to debug (our crates only)
    #[arg(long, global = true, conflicts_with_all = ["trace", "log_level", "log_filter"])]
    pub debug: bool,

    /// Set a single global log level for our crates (error|warn|info|debug|trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Set an explicit tracing filter directive (overrides other flags)
    /// e.g. "midas_engine=trace,midas::script=debug"
    #[arg(long, global = true)]
    pub log_filter: Option<String>,
}

/// Targets that constitute "our" logs.
///
/// `midas` also covers the `midas::script` target used for script output.
pub fn our_crates() -> &'static [&'static str] {
    &[
        "midas",
        "midas_engine",
        "midas_graph",
        "midas_midi",
        "midas_workspace",
        "logging",
    ]
}

/// Build a filter directive string that sets the same `level` for all of our crates.
pub fn level_spec_for(level: &str) -> String {
    let lvl = level.to_ascii_lowercase();
    our_crates()
        .iter()
        .map(|t| format!("{t}={lvl}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Compute the final filter spec string with precedence:
/// - `log_filter`
/// - `trace`/`debug`/`log_level` (crate-scoped)
/// - `RUST_LOG` env
/// - default to crate-scoped `info`
pub fn compute_spec(
    trace: bool,
    debug: bool,
    log_level: Option<&str>,
    log_filter: Option<&str>,
) -> String {
    if let Some(spec) = log_filter {
        return spec.to_string();
    }
    if trace {
        return level_spec_for("trace");
    }
    if debug {
        return level_spec_for("debug");
    }
    if let Some(lvl) = log_level {
        return level_spec_for(lvl);
    }
    env::var("RUST_LOG").unwrap_or_else(|_| level_spec_for("info"))
}

/// Create an `EnvFilter` from a spec string.
pub fn env_filter_from_spec(spec: &str) -> EnvFilter {
    EnvFilter::new(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_win_over_environment() {
        assert_eq!(
            compute_spec(true, false, Some("warn"), Some("midas_engine=trace")),
            "midas_engine=trace"
        );
        assert_eq!(compute_spec(true, true, None, None), level_spec_for("trace"));
        assert_eq!(compute_spec(false, true, None, None), level_spec_for("debug"));
        assert_eq!(compute_spec(false, false, Some("WARN"), None), level_spec_for("warn"));
    }

    #[test]
    fn level_spec_covers_every_crate() {
        let spec = level_spec_for("Debug");
        assert!(spec.starts_with("midas=debug,"));
        assert_eq!(spec.split(',').count(), our_crates().len());
        assert!(spec.split(',').all(|d| d.ends_with("=debug")));
    }
}
