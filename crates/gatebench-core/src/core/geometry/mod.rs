//! # Geometry Module
//!
//! The named volume arena and its one-shot finalization into a [`tree::ResolvedTree`].
//!
//! - [`tree`] - `GeometryTree` (mutable build phase) and `ResolvedTree` (frozen result)
//! - [`transform`] - Euler-angle rotation helpers
//! - [`bounds`] - Support functions, bounding boxes and point containment for solids
//! - [`overlap`] - Sibling overlap and mother extrusion detection

pub mod bounds;
pub mod overlap;
pub mod transform;
pub mod tree;
