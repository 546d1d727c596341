//! Tunable parameters for surfel extraction and matching

use crate::eigen::{JacobiSolver, DEFAULT_EIGEN_MAX_ITERATIONS, DEFAULT_EIGEN_TOLERANCE};
use crate::grid::{CellRounding, GridPartitioner, OriginPolicy};
use serde::{Deserialize, Serialize};
use surfelmap_core::{Error, Result};

/// Cell edge length used when extracting surfels from a single scan
pub const DEFAULT_CELL_SIZE: f32 = 1.0;

/// Cell edge length used when two scans are extracted for comparison
pub const PAIRED_CELL_SIZE: f32 = 0.5;

/// Configuration for surfel extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfelConfig {
    /// Edge length of each grid cell
    pub cell_size: f32,
    /// How the grid origin is chosen
    pub origin: OriginPolicy,
    /// How cell indices are rounded
    pub rounding: CellRounding,
    /// Cells with fewer points are skipped. The default of 1 keeps every
    /// non-empty cell.
    pub min_points_per_cell: usize,
    /// Off-diagonal tolerance of the eigen-solver
    pub eigen_tolerance: f32,
    /// Rotation budget of the eigen-solver
    pub eigen_max_iterations: usize,
    /// Fail on NaN or infinite input coordinates instead of letting them
    /// propagate into the surfels
    pub reject_non_finite: bool,
    /// Estimate cells on the rayon thread pool
    pub parallel: bool,
}

impl Default for SurfelConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            origin: OriginPolicy::default(),
            rounding: CellRounding::default(),
            min_points_per_cell: 1,
            eigen_tolerance: DEFAULT_EIGEN_TOLERANCE,
            eigen_max_iterations: DEFAULT_EIGEN_MAX_ITERATIONS,
            reject_non_finite: true,
            parallel: false,
        }
    }
}

impl SurfelConfig {
    /// Defaults for extracting two scans that will be matched
    pub fn paired() -> Self {
        Self {
            cell_size: PAIRED_CELL_SIZE,
            ..Self::default()
        }
    }

    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Check every parameter, reporting the first invalid one
    pub fn validate(&self) -> Result<()> {
        self.partitioner()?;
        self.solver()?;
        Ok(())
    }

    /// Grid partitioner described by this configuration
    pub fn partitioner(&self) -> Result<GridPartitioner> {
        Ok(GridPartitioner::new(self.cell_size)?
            .with_origin(self.origin)
            .with_rounding(self.rounding))
    }

    /// Eigen-solver described by this configuration
    pub fn solver(&self) -> Result<JacobiSolver> {
        JacobiSolver::new(self.eigen_tolerance, self.eigen_max_iterations)
    }
}

/// Configuration for surfel correspondence matching
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Drop pairs whose centroids are farther apart than this.
    /// `None` matches every query surfel regardless of distance.
    pub max_distance: Option<f32>,
    /// Run nearest neighbor queries on the rayon thread pool
    pub parallel: bool,
}

impl MatchConfig {
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.max_distance {
            Some(d) if d.is_nan() || d < 0.0 => Err(Error::InvalidData(
                "max_distance must be non-negative".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
