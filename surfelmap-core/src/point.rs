//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use bytemuck::{Pod, Zeroable};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A raw scanner point: position plus an intensity reading.
///
/// The intensity is carried along with the point but never takes part in
/// any geometric computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct IntensityPoint3f {
    pub position: Point3f,
    pub intensity: f32,
}

unsafe impl Pod for IntensityPoint3f {}
unsafe impl Zeroable for IntensityPoint3f {}

impl IntensityPoint3f {
    /// Create a point from its coordinates and intensity
    pub fn new(x: f32, y: f32, z: f32, intensity: f32) -> Self {
        Self {
            position: Point3f::new(x, y, z),
            intensity,
        }
    }

    /// Whether all three coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|c| c.is_finite())
    }
}

impl Default for IntensityPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            intensity: 0.0,
        }
    }
}

impl From<IntensityPoint3f> for Point3f {
    fn from(point: IntensityPoint3f) -> Self {
        point.position
    }
}

/// A surface element summarizing the points of one grid cell.
///
/// `normal` is the direction of least positional variance within the cell and
/// `planarity` is the product of the two larger covariance eigenvalues. The
/// planarity value is unnormalized and only meaningful for ranking surfels
/// against each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Surfel {
    pub position: Point3f,
    pub normal: Vector3f,
    pub planarity: f32,
    /// Number of input points summarized by this surfel
    pub point_count: u32,
}

unsafe impl Pod for Surfel {}
unsafe impl Zeroable for Surfel {}

impl Surfel {
    /// The surfel produced for a cell with no points: origin centroid, zero
    /// normal and zero planarity.
    pub fn degenerate() -> Self {
        Self {
            position: Point3f::origin(),
            normal: Vector3f::zeros(),
            planarity: 0.0,
            point_count: 0,
        }
    }

    /// True for surfels that do not describe any points.
    ///
    /// Consumers that only want real surface patches should filter these out
    /// before display or matching.
    pub fn is_degenerate(&self) -> bool {
        self.point_count == 0 || self.normal == Vector3f::zeros()
    }

    /// Euclidean distance between the centroids of two surfels
    pub fn distance_to(&self, other: &Surfel) -> f32 {
        (self.position - other.position).magnitude()
    }
}

impl Default for Surfel {
    fn default() -> Self {
        Self::degenerate()
    }
}

impl From<Surfel> for Point3f {
    fn from(surfel: Surfel) -> Self {
        surfel.position
    }
}

/// A reference surfel paired with the query surfel closest to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Index of the reference surfel in the reference cloud
    pub reference_index: usize,
    /// Index of the query surfel in the query cloud
    pub query_index: usize,
    pub reference: Surfel,
    pub query: Surfel,
    /// Euclidean distance between the two centroids
    pub distance: f32,
}
