//! Core traits for surfelmap

use crate::{point::*, point_cloud::*};

/// Trait for nearest neighbor search functionality
pub trait NearestNeighborSearch {
    /// Find the k nearest neighbors to a query point, closest first.
    ///
    /// Returns `(index, euclidean_distance)` pairs. Queries with non-finite
    /// coordinates return no neighbors.
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;

    /// Find the single nearest neighbor, if the index holds any point
    fn find_nearest(&self, query: &Point3f) -> Option<(usize, f32)> {
        self.find_k_nearest(query, 1).into_iter().next()
    }
}

/// Trait for drawable/renderable objects
pub trait Drawable {
    /// Get the bounding box of the object
    fn bounding_box(&self) -> (Point3f, Point3f);

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        )
    }
}

impl<T> Drawable for PointCloud<T>
where
    T: Clone + Copy,
    Point3f: From<T>,
{
    fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let first_point = Point3f::from(self.points[0]);
        let mut min = first_point;
        let mut max = first_point;

        for point in &self.points {
            let p = Point3f::from(*point);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        (min, max)
    }
}

/// Consumer of extraction and matching results.
///
/// Renderers and exporters live outside this workspace; they receive surfel
/// clouds and correspondence pairs through this trait.
pub trait SurfelSink {
    /// Receive an extracted surfel cloud. `label` names the scan it came from.
    fn accept_surfels(&mut self, label: &str, surfels: &SurfelCloud);

    /// Receive matched surfel pairs, in query order
    fn accept_correspondences(&mut self, correspondences: &[Correspondence]);
}
