//! Symmetric eigen-decomposition by cyclic Jacobi rotation
//!
//! Each step finds the largest off-diagonal element and applies the plane
//! rotation that zeroes it. The working matrix converges to a diagonal matrix
//! holding the eigenvalues while the accumulated rotations form the
//! eigenvector matrix. Eigenvalues are returned in diagonal order, unsorted.

use nalgebra::{SMatrix, SVector};
use surfelmap_core::{Error, Result};

/// Default off-diagonal magnitude below which a matrix counts as diagonal
pub const DEFAULT_EIGEN_TOLERANCE: f32 = 1e-3;

/// Default rotation budget for one decomposition
pub const DEFAULT_EIGEN_MAX_ITERATIONS: usize = 1000;

/// Outcome of a Jacobi decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Every off-diagonal element is below the tolerance
    Converged,
    /// The rotation budget ran out first. The diagonal holds the best
    /// approximation reached so far.
    IterationBudgetExceeded,
}

/// Eigenvalues and eigenvectors of a symmetric matrix
#[derive(Debug, Clone, PartialEq)]
pub struct EigenDecomposition<const N: usize> {
    /// Eigenvalues in diagonal order (not sorted)
    pub eigenvalues: SVector<f32, N>,
    /// Orthogonal matrix whose column `i` belongs to `eigenvalues[i]`
    pub eigenvectors: SMatrix<f32, N, N>,
    pub status: ConvergenceStatus,
    /// Number of rotations applied
    pub rotations: usize,
}

impl<const N: usize> EigenDecomposition<N> {
    pub fn is_converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }

    /// Rebuild `V * D * V^T` from the decomposition
    pub fn reconstruct(&self) -> SMatrix<f32, N, N> {
        let diagonal = SMatrix::<f32, N, N>::from_diagonal(&self.eigenvalues);
        self.eigenvectors * diagonal * self.eigenvectors.transpose()
    }
}

/// Cyclic Jacobi eigen-solver for small symmetric matrices.
///
/// Symmetry of the input is the caller's responsibility: only the element
/// pairs `(p, q)` / `(q, p)` are rotated together, so a non-symmetric input
/// yields meaningless output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobiSolver {
    tolerance: f32,
    max_iterations: usize,
}

impl Default for JacobiSolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_EIGEN_TOLERANCE,
            max_iterations: DEFAULT_EIGEN_MAX_ITERATIONS,
        }
    }
}

impl JacobiSolver {
    /// Create a solver with a convergence tolerance and a rotation budget.
    ///
    /// # Arguments
    /// * `tolerance` - Off-diagonal magnitude treated as zero, must be positive
    /// * `max_iterations` - Maximum number of rotations, must be positive
    pub fn new(tolerance: f32, max_iterations: usize) -> Result<Self> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(Error::InvalidData(
                "Eigen tolerance must be a positive finite number".to_string(),
            ));
        }

        if max_iterations == 0 {
            return Err(Error::InvalidData(
                "Eigen iteration budget must be positive".to_string(),
            ));
        }

        Ok(Self {
            tolerance,
            max_iterations,
        })
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Decompose a copy of `matrix`, leaving the input untouched
    pub fn decompose<const N: usize>(&self, matrix: &SMatrix<f32, N, N>) -> EigenDecomposition<N> {
        let mut working = *matrix;
        let mut eigenvectors = SMatrix::<f32, N, N>::zeros();
        let (status, rotations) = self.decompose_in_place(&mut working, &mut eigenvectors);

        EigenDecomposition {
            eigenvalues: working.diagonal(),
            eigenvectors,
            status,
            rotations,
        }
    }

    /// Diagonalize `matrix` in place and write the eigenvectors into the
    /// columns of `eigenvectors`.
    ///
    /// On return the diagonal of `matrix` holds the eigenvalues. The previous
    /// contents of `eigenvectors` are overwritten. Returns the convergence
    /// status and the number of rotations applied.
    pub fn decompose_in_place<const N: usize>(
        &self,
        matrix: &mut SMatrix<f32, N, N>,
        eigenvectors: &mut SMatrix<f32, N, N>,
    ) -> (ConvergenceStatus, usize) {
        eigenvectors.fill_with_identity();

        let mut rotations = 0;
        loop {
            let Some((p, q, magnitude)) = largest_off_diagonal(matrix) else {
                return (ConvergenceStatus::Converged, rotations);
            };

            if magnitude < self.tolerance {
                return (ConvergenceStatus::Converged, rotations);
            }

            if rotations >= self.max_iterations {
                return (ConvergenceStatus::IterationBudgetExceeded, rotations);
            }

            rotate(matrix, eigenvectors, p, q);
            rotations += 1;
        }
    }
}

/// Locate the off-diagonal element with the largest magnitude.
///
/// Returns `None` for 1x1 matrices and for matrices whose off-diagonal
/// entries are all zero (or NaN).
fn largest_off_diagonal<const N: usize>(matrix: &SMatrix<f32, N, N>) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;

    for i in 0..N {
        for j in 0..N {
            if i == j {
                continue;
            }
            let magnitude = matrix[(i, j)].abs();
            let current = best.map_or(0.0, |(_, _, m)| m);
            if magnitude > current {
                best = Some((i, j, magnitude));
            }
        }
    }

    best
}

/// Apply the rotation that zeroes `matrix[(p, q)]` and accumulate it into
/// the eigenvector matrix.
fn rotate<const N: usize>(
    matrix: &mut SMatrix<f32, N, N>,
    eigenvectors: &mut SMatrix<f32, N, N>,
    p: usize,
    q: usize,
) {
    let a_pp = matrix[(p, p)];
    let a_qq = matrix[(q, q)];
    let a_pq = matrix[(p, q)];

    let x = -a_pq;
    let y = (a_qq - a_pp) / 2.0;
    let mut omega = x / (x * x + y * y).sqrt();
    if y < 0.0 {
        omega = -omega;
    }

    // Rounding can push |omega| a hair past 1
    let sin = omega / (2.0 * (1.0 + (1.0 - omega * omega).max(0.0).sqrt())).sqrt();
    let cos = (1.0 - sin * sin).max(0.0).sqrt();

    matrix[(p, p)] = a_pp * cos * cos + a_qq * sin * sin + a_pq * omega;
    matrix[(q, q)] = a_pp * sin * sin + a_qq * cos * cos - a_pq * omega;
    matrix[(p, q)] = 0.0;
    matrix[(q, p)] = 0.0;

    for j in (0..N).filter(|&j| j != p && j != q) {
        let a_pj = matrix[(p, j)];
        let a_qj = matrix[(q, j)];
        matrix[(p, j)] = a_pj * cos + a_qj * sin;
        matrix[(q, j)] = -a_pj * sin + a_qj * cos;
    }

    for i in (0..N).filter(|&i| i != p && i != q) {
        let a_ip = matrix[(i, p)];
        let a_iq = matrix[(i, q)];
        matrix[(i, p)] = a_ip * cos + a_iq * sin;
        matrix[(i, q)] = -a_ip * sin + a_iq * cos;
    }

    for i in 0..N {
        let v_ip = eigenvectors[(i, p)];
        let v_iq = eigenvectors[(i, q)];
        eigenvectors[(i, p)] = v_ip * cos + v_iq * sin;
        eigenvectors[(i, q)] = -v_ip * sin + v_iq * cos;
    }
}
