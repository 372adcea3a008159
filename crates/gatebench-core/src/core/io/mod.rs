//! # File I/O Module
//!
//! Readers and writers for the artifacts a run produces and validation consumes.
//!
//! - [`stats_file`] - Plain-text run statistics (`# NumberOfEvents = 5000`)
//! - [`metaimage`] - MetaImage `.mhd` headers with raw voxel payloads
//! - [`table`] - Per-hit tables stored as CSV with named numeric columns
//! - [`traits`] - The `ArtifactFile` read/write interface

pub mod metaimage;
pub mod stats_file;
pub mod table;
pub mod traits;
