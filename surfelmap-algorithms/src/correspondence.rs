//! Surfel correspondence matching
//!
//! Pairs every surfel of a query cloud with the reference surfel whose
//! centroid is closest. The mapping is directional and many-to-one: several
//! query surfels may share one reference surfel, and reference surfels may go
//! unmatched. Normals and planarity take no part in the distance.

use crate::config::MatchConfig;
use crate::nearest_neighbor::KdTree;
use rayon::prelude::*;
use surfelmap_core::{Correspondence, NearestNeighborSearch, Result, Surfel, SurfelCloud};
use tracing::{debug, info};

/// Nearest-centroid matcher over a fixed reference cloud.
///
/// The spatial index is built once in the constructor; every later query is
/// read-only.
pub struct CorrespondenceMatcher<'a, S = KdTree> {
    reference: &'a SurfelCloud,
    index: S,
    max_distance: Option<f32>,
}

impl<'a> CorrespondenceMatcher<'a, KdTree> {
    /// Build a k-d tree over the reference centroids
    pub fn new(reference: &'a SurfelCloud, config: &MatchConfig) -> Result<Self> {
        let index = KdTree::new(&reference.positions())?;
        debug!(
            reference = reference.len(),
            indexed = index.len(),
            "built surfel index"
        );
        Self::with_index(reference, index, config)
    }
}

impl<'a, S: NearestNeighborSearch> CorrespondenceMatcher<'a, S> {
    /// Use a caller supplied index. Index positions must be the centroids of
    /// `reference`, in cloud order.
    pub fn with_index(reference: &'a SurfelCloud, index: S, config: &MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reference,
            index,
            max_distance: config.max_distance,
        })
    }

    /// Match a single query surfel. `query_index` is recorded in the result.
    ///
    /// Returns `None` when the reference cloud is empty, the query centroid is
    /// not finite, the nearest surfel lies beyond the distance cutoff, or the
    /// index reports a position the reference cloud does not have.
    pub fn match_one(&self, query_index: usize, query: &Surfel) -> Option<Correspondence> {
        let (reference_index, distance) = self.index.find_nearest(&query.position)?;
        let reference = self.reference.points.get(reference_index).copied()?;

        if let Some(max_distance) = self.max_distance {
            if distance > max_distance {
                return None;
            }
        }

        Some(Correspondence {
            reference_index,
            query_index,
            reference,
            query: *query,
            distance,
        })
    }

    /// Match every query surfel, preserving query order
    pub fn match_cloud(&self, query: &SurfelCloud) -> Vec<Correspondence> {
        let matches: Vec<Correspondence> = query
            .iter()
            .enumerate()
            .filter_map(|(idx, surfel)| self.match_one(idx, surfel))
            .collect();
        log_summary(query.len(), &matches);
        matches
    }
}

impl<'a, S: NearestNeighborSearch + Sync> CorrespondenceMatcher<'a, S> {
    /// Same as [`match_cloud`](Self::match_cloud) with queries spread over
    /// the rayon thread pool. Output order is identical.
    pub fn par_match_cloud(&self, query: &SurfelCloud) -> Vec<Correspondence> {
        let matches: Vec<Correspondence> = query
            .points
            .par_iter()
            .enumerate()
            .filter_map(|(idx, surfel)| self.match_one(idx, surfel))
            .collect();
        log_summary(query.len(), &matches);
        matches
    }
}

fn log_summary(queries: usize, matches: &[Correspondence]) {
    info!(
        queries,
        matched = matches.len(),
        unmatched = queries - matches.len(),
        "surfel matching complete"
    );
}

/// Pair each surfel of `query` with its nearest surfel in `reference`.
///
/// # Arguments
/// * `reference` - Cloud the spatial index is built on
/// * `query` - Cloud whose surfels are looked up
/// * `config` - Optional distance cutoff and parallelism
///
/// # Returns
/// * `Result<Vec<Correspondence>>` - At most one correspondence per query
///   surfel, in query order. An empty reference yields an empty list.
///
/// # Example
/// ```rust
/// use surfelmap_core::{Point3f, Surfel, SurfelCloud, Vector3f};
/// use surfelmap_algorithms::{match_surfels, MatchConfig};
///
/// fn main() -> surfelmap_core::Result<()> {
///     let surfel = |x: f32| Surfel {
///         position: Point3f::new(x, 0.0, 0.0),
///         normal: Vector3f::z(),
///         planarity: 1.0,
///         point_count: 10,
///     };
///     let before = SurfelCloud::from_points(vec![surfel(0.0), surfel(5.0)]);
///     let after = SurfelCloud::from_points(vec![surfel(4.5)]);
///
///     let pairs = match_surfels(&before, &after, &MatchConfig::default())?;
///     assert_eq!(pairs[0].reference_index, 1);
///     Ok(())
/// }
/// ```
pub fn match_surfels(
    reference: &SurfelCloud,
    query: &SurfelCloud,
    config: &MatchConfig,
) -> Result<Vec<Correspondence>> {
    let matcher = CorrespondenceMatcher::new(reference, config)?;
    if config.parallel {
        Ok(matcher.par_match_cloud(query))
    } else {
        Ok(matcher.match_cloud(query))
    }
}
