//! # surfelmap algorithms
//!
//! Surfel extraction and surfel correspondence matching for 3D point clouds.
//!
//! Raw points are bucketed into a voxel grid, each occupied cell is reduced to
//! a surfel (centroid, normal and planarity from the eigenstructure of the
//! cell's positional covariance), and the surfels of two scans are paired by
//! nearest centroid.

pub mod config;
pub mod correspondence;
pub mod eigen;
pub mod grid;
pub mod nearest_neighbor;
pub mod pipeline;
pub mod surfel;

// Re-export commonly used items
pub use config::*;
pub use correspondence::*;
pub use eigen::*;
pub use grid::*;
pub use nearest_neighbor::*;
pub use pipeline::*;
pub use surfel::*;
