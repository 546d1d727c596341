//! Nearest neighbor search implementations

use kdtree::distance::squared_euclidean;
use surfelmap_core::{Error, NearestNeighborSearch, Point3f, Result};
use tracing::debug;

/// KD-Tree implementation for nearest neighbor search
///
/// Points with non-finite coordinates cannot be placed in the tree and are
/// left out of the index; they are never returned as neighbors.
pub struct KdTree {
    tree: kdtree::KdTree<f32, usize, [f32; 3]>,
    skipped: usize,
}

impl KdTree {
    pub fn new(points: &[Point3f]) -> Result<Self> {
        let mut tree = kdtree::KdTree::with_capacity(3, 16);
        let mut skipped = 0;

        for (idx, point) in points.iter().enumerate() {
            if !point.coords.iter().all(|c| c.is_finite()) {
                skipped += 1;
                continue;
            }
            tree.add([point.x, point.y, point.z], idx)
                .map_err(|e| Error::Algorithm(format!("failed to index point {idx}: {e:?}")))?;
        }

        if skipped > 0 {
            debug!(skipped, "left non-finite points out of the kd-tree");
        }

        Ok(Self { tree, skipped })
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Number of input points left out because of non-finite coordinates
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl NearestNeighborSearch for KdTree {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.is_empty() || !query.coords.iter().all(|c| c.is_finite()) {
            return Vec::new();
        }

        match self.tree.nearest(&[query.x, query.y, query.z], k, &squared_euclidean) {
            Ok(neighbors) => neighbors
                .into_iter()
                .map(|(distance_squared, &idx)| (idx, distance_squared.sqrt()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch {
    points: Vec<Point3f>,
}

impl BruteForceSearch {
    pub fn new(points: &[Point3f]) -> Self {
        Self {
            points: points.to_vec(),
        }
    }
}

impl NearestNeighborSearch for BruteForceSearch {
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || !query.coords.iter().all(|c| c.is_finite()) {
            return Vec::new();
        }

        let mut distances: Vec<(usize, f32)> = self.points
            .iter()
            .enumerate()
            .filter(|(_, point)| point.coords.iter().all(|c| c.is_finite()))
            .map(|(idx, point)| (idx, (point - query).magnitude()))
            .collect();

        // Sort by distance and take k nearest
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances.truncate(k);
        distances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_points(rng: &mut StdRng, n: usize) -> Vec<Point3f> {
        (0..n)
            .map(|_| {
                Point3f::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_kdtree_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = random_points(&mut rng, 500);
        let kdtree = KdTree::new(&points).unwrap();
        let brute = BruteForceSearch::new(&points);

        for query in random_points(&mut rng, 100) {
            let (a_idx, a_dist) = kdtree.find_nearest(&query).unwrap();
            let (b_idx, b_dist) = brute.find_nearest(&query).unwrap();
            assert_eq!(a_idx, b_idx);
            assert_relative_eq!(a_dist, b_dist, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_k_nearest_sorted() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(3.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(2.0, 0.0, 0.0),
        ];
        let kdtree = KdTree::new(&points).unwrap();

        let neighbors = kdtree.find_k_nearest(&Point3f::new(0.1, 0.0, 0.0), 3);
        let indices: Vec<usize> = neighbors.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(indices, vec![0, 2, 3]);
        assert_relative_eq!(neighbors[0].1, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_index() {
        let kdtree = KdTree::new(&[]).unwrap();
        assert!(kdtree.is_empty());
        assert!(kdtree.find_nearest(&Point3f::origin()).is_none());
        assert!(BruteForceSearch::new(&[]).find_nearest(&Point3f::origin()).is_none());
    }

    #[test]
    fn test_non_finite_points_and_queries() {
        let points = vec![Point3f::new(f32::NAN, 0.0, 0.0), Point3f::new(1.0, 1.0, 1.0)];
        let kdtree = KdTree::new(&points).unwrap();

        assert_eq!(kdtree.len(), 1);
        assert_eq!(kdtree.skipped(), 1);
        assert_eq!(kdtree.find_nearest(&Point3f::origin()).map(|n| n.0), Some(1));
        assert!(kdtree.find_nearest(&Point3f::new(f32::NAN, 0.0, 0.0)).is_none());

        let brute = BruteForceSearch::new(&points);
        assert_eq!(brute.find_nearest(&Point3f::origin()).map(|n| n.0), Some(1));
        assert!(brute.find_nearest(&Point3f::new(0.0, f32::INFINITY, 0.0)).is_none());
    }
}
