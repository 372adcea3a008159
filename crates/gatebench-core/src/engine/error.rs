use super::config::ConfigError;
use crate::core::error::ModelError;
use crate::core::io::metaimage::MetaImageError;
use crate::core::io::stats_file::StatsFileError;
use crate::core::io::table::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to prepare output location '{path}': {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write statistics: {0}")]
    StatsOutput(#[from] StatsFileError),

    #[error("Failed to write hit table: {0}")]
    TableOutput(#[from] TableError),

    #[error("Failed to write image: {0}")]
    ImageOutput(#[from] MetaImageError),

    #[error("Transport engine failed: {0}")]
    Transport(String),
}
