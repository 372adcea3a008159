//! Element data and the per-simulation material registry.

pub mod elements;
pub mod registry;
