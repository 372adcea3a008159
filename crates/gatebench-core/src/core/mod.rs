//! # Core Module
//!
//! Stateless building blocks of a simulation description.
//!
//! - **Units** ([`units`]) - Symbolic units resolved to the canonical scale
//! - **Data Models** ([`models`]) - Volumes, materials, attachments and run statistics
//! - **Geometry** ([`geometry`]) - The volume arena, its finalization and overlap checks
//! - **Materials** ([`materials`]) - The element table and the material registry
//! - **File I/O** ([`io`]) - Stats files, MetaImages and hit tables
//!
//! Construction failures share one taxonomy, [`error::ModelError`].

pub mod error;
pub mod geometry;
pub mod io;
pub mod materials;
pub mod models;
pub mod units;
