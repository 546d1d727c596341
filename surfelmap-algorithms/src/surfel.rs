//! Surfel estimation
//!
//! Each grid cell is summarized by the centroid of its points and the
//! eigenstructure of their positional covariance. The eigenvector of the
//! smallest eigenvalue becomes the surfel normal and the product of the two
//! larger eigenvalues its planarity.

use crate::config::SurfelConfig;
use crate::eigen::{ConvergenceStatus, JacobiSolver};
use nalgebra::Matrix3;
use rayon::prelude::*;
use surfelmap_core::{
    Error, IntensityPoint3f, PointCloud, Point3f, Result, Surfel, SurfelCloud, Vector3f,
};
use tracing::{info, warn};

/// One eigenvalue with its eigenvector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenPair {
    pub value: f32,
    pub vector: Vector3f,
}

/// Full estimation result for one cell
#[derive(Debug, Clone, PartialEq)]
pub struct SurfelEstimate {
    pub surfel: Surfel,
    /// Eigen pairs in ascending eigenvalue order
    pub eigen_pairs: [EigenPair; 3],
    pub covariance: Matrix3<f32>,
    pub status: ConvergenceStatus,
}

/// Arithmetic mean of the point positions, `None` for an empty slice
pub fn centroid(points: &[IntensityPoint3f]) -> Option<Point3f> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f32;
    let sum = points
        .iter()
        .fold(Vector3f::zeros(), |acc, p| acc + p.position.coords);
    Some(Point3f::from(sum / n))
}

/// Biased (divided by N) positional covariance about `center`
pub fn covariance(points: &[IntensityPoint3f], center: &Point3f) -> Matrix3<f32> {
    if points.is_empty() {
        return Matrix3::zeros();
    }

    let mut cov = Matrix3::zeros();
    for point in points {
        let d = point.position - center;
        cov += d * d.transpose();
    }
    cov / points.len() as f32
}

/// Turns the points of one cell into a surfel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfelEstimator {
    solver: JacobiSolver,
}

impl SurfelEstimator {
    pub fn new(solver: JacobiSolver) -> Self {
        Self { solver }
    }

    /// Estimate a surfel, returning the intermediate eigen data as well.
    ///
    /// Returns `None` for an empty cell.
    pub fn estimate_detailed(&self, points: &[IntensityPoint3f]) -> Option<SurfelEstimate> {
        let center = centroid(points)?;
        let cov = covariance(points, &center);
        let decomposition = self.solver.decompose(&cov);

        let mut eigen_pairs: [EigenPair; 3] = std::array::from_fn(|i| EigenPair {
            value: decomposition.eigenvalues[i],
            vector: decomposition.eigenvectors.column(i).into_owned(),
        });
        eigen_pairs.sort_by(|a, b| a.value.total_cmp(&b.value));

        let surfel = Surfel {
            position: center,
            normal: eigen_pairs[0].vector,
            planarity: eigen_pairs[1].value * eigen_pairs[2].value,
            point_count: u32::try_from(points.len()).unwrap_or(u32::MAX),
        };

        Some(SurfelEstimate {
            surfel,
            eigen_pairs,
            covariance: cov,
            status: decomposition.status,
        })
    }

    /// Estimate a surfel for one cell.
    ///
    /// An empty cell yields [`Surfel::degenerate`]. A decomposition that runs
    /// out of rotations still produces a surfel from the best diagonal
    /// reached.
    pub fn estimate(&self, points: &[IntensityPoint3f]) -> Surfel {
        match self.estimate_detailed(points) {
            Some(estimate) => {
                if estimate.status == ConvergenceStatus::IterationBudgetExceeded {
                    warn!(
                        points = points.len(),
                        max_iterations = self.solver.max_iterations(),
                        "eigen decomposition did not converge, using approximate surfel"
                    );
                }
                estimate.surfel
            }
            None => Surfel::degenerate(),
        }
    }
}

/// Extract one surfel per occupied grid cell.
///
/// Cells are visited in ascending key order, so the output order is
/// reproducible and independent of `config.parallel`.
///
/// # Arguments
/// * `points` - Input scan
/// * `config` - Grid and solver parameters
///
/// # Returns
/// * `Result<SurfelCloud>` - The surfels, or an error for invalid parameters
///   or (with `reject_non_finite`) non-finite input coordinates
///
/// # Example
/// ```rust
/// use surfelmap_core::IntensityPoint3f;
/// use surfelmap_algorithms::{extract_surfels, SurfelConfig};
///
/// fn main() -> surfelmap_core::Result<()> {
///     let points = vec![
///         IntensityPoint3f::new(0.0, 0.0, 0.0, 1.0),
///         IntensityPoint3f::new(0.5, 0.0, 0.0, 1.0),
///         IntensityPoint3f::new(0.0, 0.5, 0.0, 1.0),
///         IntensityPoint3f::new(2.5, 0.0, 0.0, 1.0),
///     ];
///
///     let surfels = extract_surfels(&points, &SurfelConfig::default())?;
///     assert_eq!(surfels.len(), 2);
///     Ok(())
/// }
/// ```
pub fn extract_surfels(points: &[IntensityPoint3f], config: &SurfelConfig) -> Result<SurfelCloud> {
    let partitioner = config.partitioner()?;
    let estimator = SurfelEstimator::new(config.solver()?);

    if config.reject_non_finite {
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidData(format!(
                "point {idx} has a non-finite coordinate"
            )));
        }
    }

    let grid = partitioner.partition(points)?;
    let cells: Vec<&[IntensityPoint3f]> = grid
        .cells_sorted()
        .into_iter()
        .map(|(_, cell)| cell)
        .filter(|cell| cell.len() >= config.min_points_per_cell)
        .collect();

    let surfels: Vec<Surfel> = if config.parallel {
        cells.par_iter().map(|cell| estimator.estimate(cell)).collect()
    } else {
        cells.iter().map(|cell| estimator.estimate(cell)).collect()
    };

    info!(
        points = points.len(),
        cells = grid.len(),
        surfels = surfels.len(),
        "surfel extraction complete"
    );

    Ok(SurfelCloud::from_points(surfels))
}

/// Extension trait adding surfel extraction to intensity point clouds
pub trait SurfelExtraction {
    /// Reduce the cloud to surfels, see [`extract_surfels`]
    fn to_surfels(&self, config: &SurfelConfig) -> Result<SurfelCloud>;
}

impl SurfelExtraction for PointCloud<IntensityPoint3f> {
    fn to_surfels(&self, config: &SurfelConfig) -> Result<SurfelCloud> {
        extract_surfels(&self.points, config)
    }
}
