//! Core data structures and traits for lodcrate
//!
//! This crate provides the fundamental types shared by the simplification
//! pipeline: points, host-facing triangle meshes, transforms, relevance
//! spheres and the common error type.

pub mod point;
pub mod mesh;
pub mod traits;
pub mod transform;
pub mod relevance;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use traits::*;
pub use transform::*;
pub use relevance::*;
pub use error::*;

/// Re-exported for building relevance sphere rotations
pub use nalgebra::UnitQuaternion;
