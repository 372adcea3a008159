mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};

/// Exit code of a run whose comparisons completed with failed checks.
const EXIT_CHECKS_FAILED: u8 = 1;
/// Exit code of a run that could not complete.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_app(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ChecksFailed { failed, total }) => {
            eprintln!("\n❌ {failed} of {total} comparison(s) failed.");
            ExitCode::from(EXIT_CHECKS_FAILED)
        }
        Err(e) => {
            eprintln!("\n❌ Error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_app(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    info!("🚀 gatebench CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let command_result = match cli.command {
        Commands::Simulate(args) => {
            info!("Dispatching to 'simulate' command.");
            commands::simulate::run(args, cli.quiet)
        }
        Commands::Compare(args) => {
            info!("Dispatching to 'compare' command.");
            commands::compare::run(args)
        }
        Commands::Check(args) => {
            info!("Dispatching to 'check' command.");
            commands::check::run(args)
        }
    };

    match &command_result {
        Ok(()) => {
            info!("✅ Command completed successfully.");
            println!("✅ Command completed successfully.");
        }
        Err(e) => error!("❌ Command failed: {e}"),
    }
    command_result
}
