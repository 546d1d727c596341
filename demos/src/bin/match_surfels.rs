//! Match the surfels of a scan against a moved copy of itself

use anyhow::Result;
use clap::Parser;
use surfelmap_algorithms::{analyze_change, publish, MatchConfig, SurfelConfig};
use surfelmap_demos::{init_tracing, move_scan, synthetic_scan, PrintingSink, ScanArgs, SurfelArgs};

#[derive(Debug, Parser)]
#[command(about = "Pair surfels of a scan with surfels of a rigidly moved copy")]
struct Cli {
    #[command(flatten)]
    scan: ScanArgs,

    #[command(flatten)]
    surfel: SurfelArgs,

    /// Translation of the second scan along x
    #[arg(long, default_value_t = 0.1)]
    dx: f32,

    /// Translation of the second scan along y
    #[arg(long, default_value_t = 0.05)]
    dy: f32,

    /// Rotation of the second scan about z, in radians
    #[arg(long, default_value_t = 0.01)]
    yaw: f32,

    /// Drop pairs farther apart than this
    #[arg(long)]
    max_distance: Option<f32>,

    /// Print every n-th correspondence
    #[arg(long, default_value_t = 40)]
    stride: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let before = synthetic_scan(&cli.scan);
    let after = move_scan(&before, cli.dx, cli.dy, cli.yaw);

    let surfel_config = cli.surfel.to_config(SurfelConfig::paired());
    let match_config = MatchConfig {
        max_distance: cli.max_distance,
        parallel: surfel_config.parallel,
    };

    let analysis = analyze_change(&before.points, &after.points, &surfel_config, &match_config)?;
    publish(&analysis, &mut PrintingSink { stride: cli.stride });

    if let (Some(mean), Some(max)) = (analysis.mean_distance(), analysis.max_distance()) {
        println!("mean distance {mean:.4}, max distance {max:.4}");
    }

    Ok(())
}
