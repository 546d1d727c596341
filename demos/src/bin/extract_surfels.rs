//! Extract surfels from a synthetic scan and print a summary

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use surfelmap_algorithms::{SurfelConfig, SurfelExtraction};
use surfelmap_core::Drawable;
use surfelmap_demos::{init_tracing, synthetic_scan, ScanArgs, SurfelArgs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Reduce a synthetic scan to one surfel per occupied grid cell")]
struct Cli {
    #[command(flatten)]
    scan: ScanArgs,

    #[command(flatten)]
    surfel: SurfelArgs,

    /// Print every n-th surfel
    #[arg(long, default_value_t = 25)]
    stride: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cloud = synthetic_scan(&cli.scan);
    let (min, max) = cloud.bounding_box();
    info!(points = cloud.len(), ?min, ?max, "generated scan");

    let config = cli.surfel.to_config(SurfelConfig::default());
    let start = Instant::now();
    let surfels = cloud.to_surfels(&config)?;
    let elapsed = start.elapsed();

    println!("{} points -> {} surfels in {:?}", cloud.len(), surfels.len(), elapsed);
    for (i, s) in surfels.iter().enumerate().step_by(cli.stride.max(1)) {
        println!(
            "  {:>5}: position [{:7.3}, {:7.3}, {:7.3}]  normal [{:6.3}, {:6.3}, {:6.3}]  planarity {:.3e}  points {}",
            i,
            s.position.x,
            s.position.y,
            s.position.z,
            s.normal.x,
            s.normal.y,
            s.normal.z,
            s.planarity,
            s.point_count
        );
    }

    Ok(())
}
