//! Integration tests for surfelmap-algorithms
//!
//! These tests run synthetic scans through partitioning, surfel estimation
//! and matching together.

use approx::assert_relative_eq;
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use surfelmap_algorithms::*;
use surfelmap_core::{Drawable, IntensityPoint3f, IntensityPointCloud, Point3f, Vector3f};

/// Dense noisy samples of the z = 0 plane over [0, size) x [0, size)
fn create_noisy_plane(rng: &mut StdRng, size: f32, points: usize) -> IntensityPointCloud {
    (0..points)
        .map(|_| {
            IntensityPoint3f::new(
                rng.gen_range(0.0..size),
                rng.gen_range(0.0..size),
                rng.gen_range(-0.01..0.01),
                rng.gen_range(0.0..255.0),
            )
        })
        .collect()
}

/// Samples on the faces of an axis-aligned box corner (three planes)
fn create_box_corner(rng: &mut StdRng, size: f32, points_per_face: usize) -> IntensityPointCloud {
    let mut cloud = IntensityPointCloud::new();
    for _ in 0..points_per_face {
        let a = rng.gen_range(0.0..size);
        let b = rng.gen_range(0.0..size);
        cloud.push(IntensityPoint3f::new(a, b, 0.0, 10.0));
        cloud.push(IntensityPoint3f::new(a, 0.0, b, 20.0));
        cloud.push(IntensityPoint3f::new(0.0, a, b, 30.0));
    }
    cloud
}

#[test]
fn test_plane_surfels_have_vertical_normals() {
    let mut rng = StdRng::seed_from_u64(21);
    let cloud = create_noisy_plane(&mut rng, 4.0, 8000);

    let surfels = cloud.to_surfels(&SurfelConfig::default()).unwrap();

    assert_eq!(surfels.len(), 16);
    for surfel in &surfels {
        assert!(!surfel.is_degenerate());
        assert!(surfel.normal.z.abs() > 0.99, "normal {:?}", surfel.normal);
        assert!(surfel.planarity > 0.0);
    }
    let total: u32 = surfels.iter().map(|s| s.point_count).sum();
    assert_eq!(total as usize, cloud.len());
}

#[test]
fn test_surfel_centroids_stay_inside_the_scan() {
    let mut rng = StdRng::seed_from_u64(4);
    let cloud = create_box_corner(&mut rng, 3.0, 2000);
    let (min, max) = cloud.bounding_box();

    let surfels = extract_surfels(&cloud.points, &SurfelConfig::paired()).unwrap();
    assert!(!surfels.is_empty());

    for surfel in &surfels {
        for axis in 0..3 {
            assert!(surfel.position[axis] >= min[axis] - 1e-5);
            assert!(surfel.position[axis] <= max[axis] + 1e-5);
        }
        assert_relative_eq!(surfel.normal.magnitude(), 1.0, epsilon = 1e-3);
    }
}

#[test]
fn test_parallel_extraction_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(9);
    let cloud = create_box_corner(&mut rng, 4.0, 3000);

    let sequential = extract_surfels(&cloud.points, &SurfelConfig::paired()).unwrap();
    let parallel = extract_surfels(
        &cloud.points,
        &SurfelConfig {
            parallel: true,
            ..SurfelConfig::paired()
        },
    )
    .unwrap();

    assert_eq!(sequential, parallel);
}

#[test]
fn test_extraction_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(17);
    let cloud = create_noisy_plane(&mut rng, 6.0, 5000);

    let first = extract_surfels(&cloud.points, &SurfelConfig::paired()).unwrap();
    let second = extract_surfels(&cloud.points, &SurfelConfig::paired()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_zero_clamped_origin_changes_lattice_for_offset_scans() {
    // The whole scan lies in [10.25, 11.25) so the minimum anchored lattice
    // uses one cell per axis while the zero anchored one straddles 11.0
    let points: Vec<IntensityPoint3f> = (0..100)
        .map(|i| {
            let t = 10.25 + (i as f32) * 0.00999;
            IntensityPoint3f::new(t, 10.5, 10.5, 0.0)
        })
        .collect();

    let corrected = extract_surfels(&points, &SurfelConfig::default()).unwrap();
    let legacy = extract_surfels(
        &points,
        &SurfelConfig {
            origin: OriginPolicy::ZeroClamped,
            rounding: CellRounding::TruncateTowardZero,
            ..SurfelConfig::default()
        },
    )
    .unwrap();

    assert_eq!(corrected.len(), 1);
    assert_eq!(legacy.len(), 2);
}

#[test]
fn test_identical_scans_match_with_zero_distance() {
    let mut rng = StdRng::seed_from_u64(33);
    let cloud = create_box_corner(&mut rng, 3.0, 1500);
    let surfels = extract_surfels(&cloud.points, &SurfelConfig::paired()).unwrap();

    let pairs = match_surfels(&surfels, &surfels, &MatchConfig::default()).unwrap();

    assert_eq!(pairs.len(), surfels.len());
    for (i, pair) in pairs.iter().enumerate() {
        assert_eq!(pair.query_index, i);
        assert_eq!(pair.reference_index, i);
        assert_relative_eq!(pair.distance, 0.0);
    }
}

#[test]
fn test_rigidly_moved_scan_matching() {
    let mut rng = StdRng::seed_from_u64(8);
    let before = create_noisy_plane(&mut rng, 5.0, 6000);

    let motion = Isometry3::from_parts(
        Translation3::new(0.05, -0.03, 0.02),
        UnitQuaternion::from_axis_angle(&Vector3f::z_axis(), 0.01),
    );
    let after: Vec<IntensityPoint3f> = before
        .iter()
        .map(|p| IntensityPoint3f {
            position: motion * p.position,
            intensity: p.intensity,
        })
        .collect();

    let analysis = analyze_change(
        &before.points,
        &after,
        &SurfelConfig::paired(),
        &MatchConfig::default(),
    )
    .unwrap();

    // Totality: every query surfel is matched exactly once
    assert_eq!(analysis.correspondences.len(), analysis.query.len());
    let mut seen = vec![false; analysis.query.len()];
    for c in &analysis.correspondences {
        assert!(!seen[c.query_index]);
        seen[c.query_index] = true;
    }

    // Small motion relative to the cell size keeps pairs close
    assert!(analysis.mean_distance().unwrap() < 0.25);
}

#[test]
fn test_distance_cutoff_drops_far_pairs() {
    let before = vec![
        IntensityPoint3f::new(0.1, 0.1, 0.0, 1.0),
        IntensityPoint3f::new(0.3, 0.2, 0.0, 1.0),
    ];
    let after = vec![
        IntensityPoint3f::new(0.1, 0.1, 0.0, 1.0),
        IntensityPoint3f::new(0.3, 0.2, 0.0, 1.0),
        IntensityPoint3f::new(8.0, 8.0, 0.0, 1.0),
    ];

    let config = MatchConfig::default().with_max_distance(1.0);
    let analysis = analyze_change(&before, &after, &SurfelConfig::default(), &config).unwrap();

    assert_eq!(analysis.query.len(), 2);
    assert_eq!(analysis.correspondences.len(), 1);
    assert_relative_eq!(
        analysis.correspondences[0].reference.position,
        Point3f::new(0.2, 0.15, 0.0),
        epsilon = 1e-6
    );
}

#[test]
fn test_sorted_eigen_pairs_across_cells() {
    let mut rng = StdRng::seed_from_u64(2);
    let cloud = create_box_corner(&mut rng, 2.0, 1000);
    let grid = GridPartitioner::new(0.5).unwrap().partition(&cloud.points).unwrap();
    let estimator = SurfelEstimator::default();

    for (_, cell) in grid.cells_sorted() {
        let estimate = estimator.estimate_detailed(cell).unwrap();
        let values: Vec<f32> = estimate.eigen_pairs.iter().map(|e| e.value).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_relative_eq!(estimate.covariance, estimate.covariance.transpose(), epsilon = 1e-6);
    }
}
