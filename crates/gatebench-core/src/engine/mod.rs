//! # Engine Module
//!
//! The simulation context: one build's configuration, geometry, materials and
//! attachments, plus the seam to the transport engine that consumes them.
//!
//! ## Overview
//!
//! A [`simulation::Simulation`] is populated through its builder-style API (or from a
//! [`scene`] file), then [`simulation::Simulation::initialize`] finalizes the geometry,
//! resolves every attachment against it and hands back a
//! [`simulation::SimulationContract`]. Any [`transport::TransportEngine`] turns the contract
//! into a [`crate::core::models::stats::RunStatistics`] record and output artifacts.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Threads, seed, overlap checking, output location
//! - **Attachments** ([`attachments`]) - Sources, actors and regions bound to volumes
//! - **Context** ([`simulation`]) - The `Simulation` object and its initialization contract
//! - **Transport** ([`transport`]) - The engine trait and a deterministic stub engine
//! - **Scenes** ([`scene`]) - TOML scene descriptions applied onto a simulation
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-level error type

pub mod attachments;
pub mod config;
pub mod error;
pub mod progress;
pub mod scene;
pub mod simulation;
pub mod transport;
