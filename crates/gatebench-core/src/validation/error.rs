use crate::core::io::metaimage::MetaImageError;
use crate::core::io::stats_file::StatsFileError;
use crate::core::io::table::TableError;
use crate::core::models::image::ImageGeometry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Image geometry mismatch: actual has {actual}, reference has {reference}")]
    GeometryMismatch {
        actual: ImageGeometry,
        reference: ImageGeometry,
    },

    #[error("Invalid comparison option '{option}': {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    #[error("Failed to read image: {0}")]
    Image(#[from] MetaImageError),

    #[error("Failed to read hit table: {0}")]
    Table(#[from] TableError),

    #[error("Failed to read statistics: {0}")]
    Stats(#[from] StatsFileError),

    #[error("Failed to write comparison artifact '{path}': {source}")]
    Artifact {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write comparison artifact: {0}")]
    Csv(#[from] csv::Error),
}
