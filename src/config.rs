use std::path::{Path, PathBuf};

/// Accumulation a cell must exceed to be a snapping target for the pour point.
pub const SNAP_THRESHOLD: f64 = 1000.0;

/// Thresholds exported by a sweep, in export order.
pub const SWEEP_THRESHOLDS: [i64; 6] = [50, 100, 500, 1000, 1500, 2000];

pub const CATCHMENT_DIR: &str = "CatchmentShapefile";
pub const CATCHMENT_FILE: &str = "catchment_shapefile.shp";
pub const NETWORK_DIR: &str = "Network_Branches";

/// Which network thresholds to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Every threshold of [`SWEEP_THRESHOLDS`], each in its own folder.
    All,
    /// One threshold, any integer.
    Single(i64),
}

impl ThresholdMode {
    pub fn thresholds(&self) -> Vec<i64> {
        match self {
            ThresholdMode::All => SWEEP_THRESHOLDS.to_vec(),
            ThresholdMode::Single(t) => vec![*t],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PourPointSource {
    /// Ask for a click in the accumulation viewer.
    Interactive,
    Fixed(f64, f64),
}

/// Area networks are extracted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkExtent {
    /// The catchment's bounding window, cells outside the catchment excluded.
    #[default]
    Catchment,
    /// The whole DEM.
    Full,
}

/// Everything a run needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub raster: PathBuf,
    pub mode: ThresholdMode,
    pub pour_point: PourPointSource,
    pub output_dir: PathBuf,
    pub network_extent: NetworkExtent,
}

impl RunConfig {
    pub fn new(raster: impl Into<PathBuf>, mode: ThresholdMode) -> Self {
        Self {
            raster: raster.into(),
            mode,
            pour_point: PourPointSource::Interactive,
            output_dir: PathBuf::from("."),
            network_extent: NetworkExtent::default(),
        }
    }

    pub fn catchment_dir(&self) -> PathBuf {
        self.output_dir.join(CATCHMENT_DIR)
    }

    pub fn network_dir(&self) -> PathBuf {
        network_dir(&self.output_dir)
    }
}

pub fn network_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(NETWORK_DIR)
}
