//! `delineate` - catchment and stream network delineation from a DEM

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catchment_delineate::cli::Cli;
use catchment_delineate::pipeline;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = cli.into_config()?;
    let start = Instant::now();
    let summary = pipeline::run(&config)
        .with_context(|| format!("delineation of {} failed", config.raster.display()))?;
    info!("done in {:.1?}", start.elapsed());

    println!("Catchment: {} ({} cells)", summary.catchment_path.display(), summary.catchment_cells);
    for network in &summary.networks {
        println!(
            "Threshold {}: {} ({} branches)",
            network.threshold,
            network.path.display(),
            network.features
        );
    }
    Ok(())
}
