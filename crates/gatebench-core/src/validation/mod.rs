//! # Validation Module
//!
//! Compares the artifacts of a run against reference artifacts and reports a [`Verdict`]
//! made of individual [`Check`]s.
//!
//! ## Overview
//!
//! Mismatches are never errors: every comparison runs to completion and records which
//! quantity failed and by how much. Errors are reserved for inputs that cannot be compared
//! at all, such as unreadable files or images laid out on different grids.
//!
//! - **Run statistics** ([`stats`]) - Relative deviation of every reference counter
//! - **Hit tables** ([`histogram`]) - Hit-count check plus per-column mean comparison
//! - **Images** ([`image`]) - Masked, optionally axis-profiled, normalized difference
//! - **Tolerances** ([`tolerance`]) - Per-key tolerance entries and hit-count tolerance
//! - **Verdicts** ([`verdict`]) - Checks, their aggregation and display
//!
//! [`Verdict`]: verdict::Verdict
//! [`Check`]: verdict::Check

pub mod error;
pub mod histogram;
pub mod image;
pub mod stats;
pub mod tolerance;
pub mod verdict;
