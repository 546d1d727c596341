//! Core data structures and traits for surfelmap
//!
//! This crate provides the fundamental types shared by surfel extraction and
//! surfel matching: intensity points, surfels, point clouds, errors and the
//! traits that sit at the boundaries with loaders, spatial indexes and renderers.

pub mod point;
pub mod point_cloud;
pub mod traits;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3};
