//! # Core Models Module
//!
//! Data structures describing one simulation build.
//!
//! - [`volume`] - Volumes, their shapes and local placement
//! - [`material`] - Material compositions
//! - [`attachment`] - Sources, actors and region policies bound to volumes by name
//! - [`stats`] - The run statistics record returned by a transport engine
//! - [`image`] - Voxel images shared by projection outputs and image validation
//! - [`ids`] - Arena keys for volumes
//!
//! ```ignore
//! use gatebench::core::geometry::tree::GeometryTree;
//! use gatebench::core::models::volume::{Shape, ShapeKind};
//! use gatebench::core::units::CM;
//!
//! let mut tree = GeometryTree::new();
//! tree.add_volume(ShapeKind::Box, "Box")?
//!     .set_shape(Shape::cuboid([1.0 * CM, 1.0 * CM, 1.0 * CM]))
//!     .set_material("G4_WATER")
//!     .set_translation([0.0, 0.0, -5.0 * CM]);
//! ```

pub mod attachment;
pub mod ids;
pub mod image;
pub mod material;
pub mod stats;
pub mod volume;
