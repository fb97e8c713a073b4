//! Entry point for the `midas` binary.

mod cli;
mod commands;
mod error;
mod input;

use std::{io, process};

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, registry};

use crate::{
    cli::{Cli, Commands},
    error::Result,
};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, and dispatch to the chosen subcommand.
fn run() -> Result<()> {
    let Cli { log, command } = Cli::parse();
    let log_spec = logging::compute_spec(
        log.trace,
        log.debug,
        log.log_level.as_deref(),
        log.log_filter.as_deref(),
    );
    registry()
        .with(logging::env_filter_from_spec(&log_spec))
        .with(fmt::layer().with_writer(io::stderr).without_time())
        .try_init()
        .ok();

    match command {
        Commands::Run(args) => commands::run(&args),
        Commands::Check(args) => commands::check(&args),
        Commands::Templates => {
            commands::templates_list();
            Ok(())
        }
        Commands::Preset(args) => commands::write_preset(&args),
        Commands::AudioTargets(args) => {
            commands::audio_targets(&args);
            Ok(())
        }
    }
}
