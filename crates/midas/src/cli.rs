//! Command-line interface definitions for midas.

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use logging::LogArgs;

/// Command-line interface for the `midas` binary.
#[derive(Parser, Debug)]
#[command(
    name = "midas",
    about = "Drive desktop automation from MIDI controllers through a node graph",
    version
)]
pub struct Cli {
    /// Logging controls shared across midas binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// What to do.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch events read from stdin (one per line) through a workspace.
    Run(RunArgs),
    /// Load a workspace and summarize it.
    Check(WorkspaceArgs),
    /// List the available node types.
    Templates,
    /// Write a built-in preset workspace.
    Preset(PresetArgs),
    /// List volume targets offered by the system mixer.
    AudioTargets(AudioArgs),
}

/// A workspace file argument.
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Workspace file (JSON).
    #[arg(long, short, value_name = "PATH")]
    pub workspace: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Workspace to run.
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Identifier exposed to actions as `MIDAS_WORKSPACE_ID`. Defaults to the
    /// workspace file stem.
    #[arg(long, value_name = "ID")]
    pub workspace_id: Option<String>,

    /// Read raw MIDI bytes as hex (`b0 07 7f`) instead of JSON events.
    #[arg(long)]
    pub raw: bool,

    /// Port name attached to raw events.
    #[arg(long, value_name = "PORT", requires = "raw")]
    pub source: Option<String>,

    /// Limit for blocking mixer and shortcut calls.
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "2s",
        value_name = "DURATION"
    )]
    pub timeout: Duration,

    /// Print display state changes of triggered input nodes.
    #[arg(long)]
    pub show_display: bool,
}

/// Arguments for the `preset` subcommand.
#[derive(Args, Debug, Clone)]
pub struct PresetArgs {
    /// Preset to write.
    #[arg(long, default_value = "default-mixer", value_name = "ID")]
    pub id: String,

    /// Destination file.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,
}

/// Arguments for the `audio-targets` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AudioArgs {
    /// Limit for each mixer query.
    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "2s",
        value_name = "DURATION"
    )]
    pub timeout: Duration,
}
