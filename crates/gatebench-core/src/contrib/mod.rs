//! Ready-made geometry builders for commonly simulated devices.

pub mod linac;
