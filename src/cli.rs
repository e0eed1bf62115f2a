//! Command-line interface of the `delineate` binary.
use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::config::{NetworkExtent, PourPointSource, RunConfig, ThresholdMode};
use crate::error::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "delineate")]
#[command(version, about = "Delineate a catchment and its stream network from a DEM", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["all", "threshold"])))]
pub struct Cli {
    /// Input DEM (GeoTIFF)
    #[arg(short, long)]
    pub raster: PathBuf,

    /// Export the network at every sweep threshold (50, 100, 500, 1000, 1500, 2000)
    #[arg(short, long)]
    pub all: bool,

    /// Export the network at a single accumulation threshold
    #[arg(short, long, allow_negative_numbers = true)]
    pub threshold: Option<i64>,

    /// Pour point as X,Y in raster coordinates; skips the interactive picker
    #[arg(short, long, value_name = "X,Y", value_parser = parse_pour_point, allow_hyphen_values = true)]
    pub pour_point: Option<(f64, f64)>,

    /// Directory the output folders are created in
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Extract networks over the whole DEM instead of the catchment
    #[arg(long)]
    pub full_extent: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses `X,Y` into a coordinate pair.
pub fn parse_pour_point(s: &str) -> std::result::Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("{v:?} is not a finite number"))
    };
    Ok((parse(x)?, parse(y)?))
}

impl Cli {
    /// Validates the parsed arguments into a [`RunConfig`].
    ///
    /// Parsing already rejects both or neither of `--all` and `--threshold`
    /// through the required `mode` group. A `Cli` built directly skips that
    /// check, so the combination is checked again here and reported as
    /// [`Error::Usage`].
    pub fn into_config(self) -> Result<RunConfig> {
        let mode = match (self.all, self.threshold) {
            (true, None) => ThresholdMode::All,
            (false, Some(t)) => ThresholdMode::Single(t),
            _ => return Err(Error::Usage("exactly one of --all and --threshold is required".to_string())),
        };
        Ok(RunConfig {
            raster: self.raster,
            mode,
            pour_point: match self.pour_point {
                Some((x, y)) => PourPointSource::Fixed(x, y),
                None => PourPointSource::Interactive,
            },
            output_dir: self.output_dir,
            network_extent: if self.full_extent {
                NetworkExtent::Full
            } else {
                NetworkExtent::Catchment
            },
        })
    }
}
