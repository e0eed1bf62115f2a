use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("{path} has no georeferencing (no pixel scale/tiepoint or transformation tag)")]
    MissingGeoTransform { path: PathBuf },

    #[error("{path} has no detectable coordinate reference system")]
    UndefinedCrs { path: PathBuf },

    #[error("{path} uses an unsupported sample format")]
    UnsupportedSampleFormat { path: PathBuf },

    #[error("raster holds {got} samples, expected {rows}x{cols}")]
    SampleCount { got: usize, rows: usize, cols: usize },

    #[error("no cell qualifies as a channel to snap the pour point to")]
    NoChannelCell,

    #[error("point ({x}, {y}) lies outside the grid")]
    OutsideExtent { x: f64, y: f64 },

    #[error("the viewer closed before a pour point was selected")]
    NoPourPoint,

    #[error("viewer error: {0}")]
    Viewer(String),

    #[error("invalid field name {name:?}: {reason}")]
    FieldName { name: String, reason: String },

    #[error("feature {index} of layer {layer} is not a {expected} geometry")]
    GeometryMismatch {
        layer: String,
        index: usize,
        expected: &'static str,
    },

    #[error("feature {index} of layer {layer} has a degenerate geometry")]
    DegenerateGeometry { layer: String, index: usize },

    #[error("usage: {0}")]
    Usage(String),

    #[error("network export failed for thresholds {0:?}")]
    SweepFailed(Vec<i64>),
}

pub type Result<T> = std::result::Result<T, Error>;
