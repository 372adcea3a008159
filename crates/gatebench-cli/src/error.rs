use crate::utils::parser::ParseError;
use gatebench::core::io::stats_file::StatsFileError;
use gatebench::engine::error::EngineError;
use gatebench::engine::scene::SceneError;
use gatebench::validation::error::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read stats file '{path}': {source}", path = path.display())]
    Stats {
        path: PathBuf,
        #[source]
        source: StatsFileError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(#[from] ParseError),

    /// One or more comparisons completed with failed checks.
    #[error("{failed} of {total} comparison(s) failed")]
    ChecksFailed { failed: usize, total: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
