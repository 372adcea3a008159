use crate::error::{CliError, Result};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Environment variable holding filter directives, e.g. `gatebench::validation=debug`.
pub const LOG_ENV: &str = "GATEBENCH_LOG";

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Directives from the environment take over unless `--quiet` is given.
fn build_filter(directives: Option<&str>, verbosity: u8, quiet: bool) -> Result<EnvFilter> {
    match directives.map(str::trim) {
        Some(raw) if !quiet && !raw.is_empty() => EnvFilter::try_new(raw)
            .map_err(|e| CliError::Config(format!("Invalid {LOG_ENV} value '{raw}': {e}"))),
        _ => Ok(EnvFilter::default().add_directive(level_filter(verbosity, quiet).into())),
    }
}

/// Installs the global subscriber: compact events on stderr, plus a plain file log
/// that also records how long each instrumented phase (finalize, run, compare) took.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let directives = std::env::var(LOG_ENV).ok();
    let filter = build_filter(directives.as_deref(), verbosity, quiet)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .compact();

    let subscriber = tracing_subscriber::registry().with(filter).with(stderr_layer);

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true);
            subscriber.with(file_layer).try_init()
        }
        None => subscriber.try_init(),
    };

    result.map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {e}")))
}
