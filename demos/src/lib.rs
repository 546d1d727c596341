//! Shared pieces of the surfelmap command line demos

use clap::{Args, ValueEnum};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use surfelmap_algorithms::{CellRounding, OriginPolicy, SurfelConfig};
use surfelmap_core::{
    Correspondence, Drawable, IntensityPoint3f, IntensityPointCloud, SurfelCloud, SurfelSink,
    Vector3f,
};
use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber driven by `RUST_LOG`, defaulting to `info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OriginArg {
    Minimum,
    ZeroClamped,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoundingArg {
    Floor,
    Truncate,
}

/// Surfel extraction flags
#[derive(Debug, Args)]
pub struct SurfelArgs {
    /// Edge length of a grid cell (1.0 for single scans, 0.5 for paired scans)
    #[arg(long)]
    pub cell_size: Option<f32>,

    /// Lattice origin policy
    #[arg(long, value_enum, default_value_t = OriginArg::Minimum)]
    pub origin: OriginArg,

    /// Cell index rounding
    #[arg(long, value_enum, default_value_t = RoundingArg::Floor)]
    pub rounding: RoundingArg,

    /// Cells with fewer points are skipped
    #[arg(long, default_value_t = 1)]
    pub min_points: usize,

    /// Run per-cell estimation on the rayon pool
    #[arg(long)]
    pub parallel: bool,
}

impl SurfelArgs {
    /// Overlay the flags on `base`, which supplies the cell size when
    /// `--cell-size` is absent
    pub fn to_config(&self, base: SurfelConfig) -> SurfelConfig {
        SurfelConfig {
            cell_size: self.cell_size.unwrap_or(base.cell_size),
            origin: match self.origin {
                OriginArg::Minimum => OriginPolicy::Minimum,
                OriginArg::ZeroClamped => OriginPolicy::ZeroClamped,
            },
            rounding: match self.rounding {
                RoundingArg::Floor => CellRounding::Floor,
                RoundingArg::Truncate => CellRounding::TruncateTowardZero,
            },
            min_points_per_cell: self.min_points,
            parallel: self.parallel,
            ..base
        }
    }
}

/// Synthetic scan flags
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Number of points per scan
    #[arg(long, default_value_t = 20_000)]
    pub points: usize,

    /// Side length of the scanned area
    #[arg(long, default_value_t = 10.0)]
    pub extent: f32,

    /// Seed for the point generator
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

/// Noisy samples of a floor with a wall along x = 0
pub fn synthetic_scan(args: &ScanArgs) -> IntensityPointCloud {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let extent = args.extent.max(f32::EPSILON);

    (0..args.points)
        .map(|i| {
            let a = rng.gen_range(0.0..extent);
            let b = rng.gen_range(0.0..extent);
            let noise = rng.gen_range(-0.01..0.01);
            if i % 4 == 0 {
                IntensityPoint3f::new(noise, a, b * 0.3, 200.0)
            } else {
                IntensityPoint3f::new(a, b, noise, rng.gen_range(0.0..100.0))
            }
        })
        .collect()
}

/// Apply a planar rigid motion to every point of a scan
pub fn move_scan(scan: &IntensityPointCloud, dx: f32, dy: f32, yaw: f32) -> IntensityPointCloud {
    let motion = Isometry3::from_parts(
        Translation3::new(dx, dy, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3f::z_axis(), yaw),
    );
    scan.iter()
        .map(|p| IntensityPoint3f {
            position: motion * p.position,
            intensity: p.intensity,
        })
        .collect()
}

/// Sink that prints a summary of everything it receives
pub struct PrintingSink {
    /// Print every `stride`-th correspondence
    pub stride: usize,
}

impl SurfelSink for PrintingSink {
    fn accept_surfels(&mut self, label: &str, surfels: &SurfelCloud) {
        let (min, max) = surfels.bounding_box();
        println!(
            "{label}: {} surfels, bounds [{:.2}, {:.2}, {:.2}] .. [{:.2}, {:.2}, {:.2}]",
            surfels.len(),
            min.x,
            min.y,
            min.z,
            max.x,
            max.y,
            max.z
        );
    }

    fn accept_correspondences(&mut self, correspondences: &[Correspondence]) {
        println!("{} correspondences", correspondences.len());
        for c in correspondences.iter().step_by(self.stride.max(1)) {
            println!(
                "  query {:>5} -> reference {:>5}  distance {:.4}  planarity {:.3e} / {:.3e}",
                c.query_index,
                c.reference_index,
                c.distance,
                c.query.planarity,
                c.reference.planarity
            );
        }
    }
}
