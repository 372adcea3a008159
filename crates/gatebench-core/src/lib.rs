//! # gatebench Core Library
//!
//! Builds Monte Carlo particle-transport simulation descriptions (linac heads, SPECT and
//! PET detectors) and validates the artifacts a transport engine produces from them.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Unit tables, data models (volumes, materials,
//!   attachments, run statistics), the geometry tree with its finalization pass, the
//!   material registry, and artifact I/O (stats files, MetaImages, hit tables).
//!
//! - **[`engine`]: The Simulation Context.** Owns one simulation build (configuration,
//!   geometry, materials, attachments), loads it from TOML scenes, resolves it into the
//!   initialization contract and defines the [`engine::transport::TransportEngine`] seam
//!   to the external engine.
//!
//! - **[`validation`]: The Verdict Layer.** Compares run statistics, per-hit tables and
//!   images against references under per-quantity tolerances and reports every check.
//!
//! [`contrib`] holds ready-made geometry builders (e.g. the Elekta Synergy linac head).

pub mod contrib;
pub mod core;
pub mod engine;
pub mod validation;
