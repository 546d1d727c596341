//! Change analysis between two scans
//!
//! Both scans are reduced to surfels with the same grid, the first scan
//! becomes the reference, and every surfel of the second scan is paired with
//! its nearest reference surfel.

use crate::config::{MatchConfig, SurfelConfig};
use crate::correspondence::match_surfels;
use crate::surfel::extract_surfels;
use surfelmap_core::{Correspondence, IntensityPoint3f, Result, SurfelCloud, SurfelSink};
use tracing::info;

/// Surfels of two scans and the correspondences between them
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeAnalysis {
    /// Surfels of the earlier scan, the matching reference
    pub reference: SurfelCloud,
    /// Surfels of the later scan, the matching queries
    pub query: SurfelCloud,
    /// One entry per matched query surfel, in query order
    pub correspondences: Vec<Correspondence>,
}

impl ChangeAnalysis {
    /// Mean centroid distance over all correspondences, `None` if there are none
    pub fn mean_distance(&self) -> Option<f32> {
        if self.correspondences.is_empty() {
            return None;
        }
        let total: f32 = self.correspondences.iter().map(|c| c.distance).sum();
        Some(total / self.correspondences.len() as f32)
    }

    /// Largest centroid distance over all correspondences
    pub fn max_distance(&self) -> Option<f32> {
        self.correspondences
            .iter()
            .map(|c| c.distance)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Correspondences whose surfels moved farther than `threshold`
    pub fn moved(&self, threshold: f32) -> impl Iterator<Item = &Correspondence> + '_ {
        self.correspondences
            .iter()
            .filter(move |c| c.distance > threshold)
    }
}

/// Extract surfels from `before` and `after` and match `after` against `before`.
///
/// # Arguments
/// * `before` - Earlier scan, used as the matching reference
/// * `after` - Later scan, used as the matching queries
/// * `surfel_config` - Extraction parameters shared by both scans
/// * `match_config` - Matching parameters
pub fn analyze_change(
    before: &[IntensityPoint3f],
    after: &[IntensityPoint3f],
    surfel_config: &SurfelConfig,
    match_config: &MatchConfig,
) -> Result<ChangeAnalysis> {
    match_config.validate()?;

    let reference = extract_surfels(before, surfel_config)?;
    let query = extract_surfels(after, surfel_config)?;
    let correspondences = match_surfels(&reference, &query, match_config)?;

    let analysis = ChangeAnalysis {
        reference,
        query,
        correspondences,
    };

    info!(
        reference = analysis.reference.len(),
        query = analysis.query.len(),
        correspondences = analysis.correspondences.len(),
        mean_distance = analysis.mean_distance().unwrap_or(0.0),
        "change analysis complete"
    );

    Ok(analysis)
}

/// Hand both surfel clouds and the correspondences to a sink
pub fn publish<S: SurfelSink + ?Sized>(analysis: &ChangeAnalysis, sink: &mut S) {
    sink.accept_surfels("reference", &analysis.reference);
    sink.accept_surfels("query", &analysis.query);
    sink.accept_correspondences(&analysis.correspondences);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct RecordingSink {
        clouds: Vec<(String, usize)>,
        correspondences: usize,
    }

    impl SurfelSink for RecordingSink {
        fn accept_surfels(&mut self, label: &str, surfels: &SurfelCloud) {
            self.clouds.push((label.to_string(), surfels.len()));
        }

        fn accept_correspondences(&mut self, correspondences: &[Correspondence]) {
            self.correspondences += correspondences.len();
        }
    }

    fn plane(offset_z: f32) -> Vec<IntensityPoint3f> {
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                let x = i as f32 * 0.05;
                let y = j as f32 * 0.05;
                let z = offset_z + 0.01 * ((i + j) % 3) as f32;
                points.push(IntensityPoint3f::new(x, y, z, 1.0));
            }
        }
        points
    }

    #[test]
    fn test_unchanged_scan() {
        let scan = plane(0.0);
        let analysis = analyze_change(&scan, &scan, &SurfelConfig::paired(), &MatchConfig::default()).unwrap();

        assert_eq!(analysis.reference, analysis.query);
        assert_eq!(analysis.correspondences.len(), analysis.query.len());
        assert_relative_eq!(analysis.mean_distance().unwrap(), 0.0);
        assert_eq!(analysis.moved(1e-6).count(), 0);
    }

    #[test]
    fn test_lifted_scan() {
        let analysis = analyze_change(
            &plane(0.0),
            &plane(0.2),
            &SurfelConfig::paired().with_cell_size(0.5),
            &MatchConfig::default(),
        )
        .unwrap();

        assert_eq!(analysis.correspondences.len(), analysis.query.len());
        // Origin follows the scan minimum, so the lattice moves with the
        // plane and each surfel lands exactly 0.2 above its counterpart
        assert_relative_eq!(analysis.mean_distance().unwrap(), 0.2, epsilon = 1e-4);
        assert_relative_eq!(analysis.max_distance().unwrap(), 0.2, epsilon = 1e-4);
    }

    #[test]
    fn test_empty_before_scan() {
        let analysis = analyze_change(&[], &plane(0.0), &SurfelConfig::paired(), &MatchConfig::default()).unwrap();
        assert!(analysis.reference.is_empty());
        assert!(analysis.correspondences.is_empty());
        assert!(analysis.mean_distance().is_none());
        assert!(analysis.max_distance().is_none());
    }

    #[test]
    fn test_publish_to_sink() {
        let scan = plane(0.0);
        let analysis = analyze_change(&scan, &scan, &SurfelConfig::paired(), &MatchConfig::default()).unwrap();

        let mut sink = RecordingSink::default();
        publish(&analysis, &mut sink);

        assert_eq!(
            sink.clouds,
            vec![
                ("reference".to_string(), analysis.reference.len()),
                ("query".to_string(), analysis.query.len()),
            ]
        );
        assert_eq!(sink.correspondences, analysis.correspondences.len());
    }
}
