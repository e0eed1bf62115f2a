//! Shapefile export of the catchment and of the stream network at one or
//! more accumulation thresholds.
use std::fs;
use std::path::{Path, PathBuf};

use geojson::FeatureCollection;
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::config::{ThresholdMode, CATCHMENT_FILE, NETWORK_DIR};
use crate::error::{Error, Result};
use crate::network::extract_river_network;
use crate::raster::{Crs, GeoTransform};
use crate::routing::DirMap;
use crate::vector::{GeometryKind, VectorLayer};

/// Where the network for `threshold` goes under `base`.
///
/// A sweep gives every threshold its own folder,
/// `base/Network_Branches_{T}/Network_Branches_{T}.shp`; a single threshold
/// is written straight into `base`.
pub fn network_path(base: &Path, threshold: i64, mode: ThresholdMode) -> PathBuf {
    let stem = format!("{NETWORK_DIR}_{threshold}");
    match mode {
        ThresholdMode::All => base.join(&stem).join(format!("{stem}.shp")),
        ThresholdMode::Single(_) => base.join(format!("{stem}.shp")),
    }
}

/// Writes a layer, creating its parent directories first, and a `.prj`
/// beside it when `crs` has a known WKT.
fn write_layer(layer: &VectorLayer, path: &Path, crs: &Crs) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let written = layer.write_shapefile(path)?;
    let prj = path.with_extension("prj");
    match crs.wkt() {
        Some(wkt) => fs::write(&prj, wkt)?,
        None => {
            debug!("no WKT for crs {}, {} not written", crs, prj.display());
            // drop a projection left by an earlier run
            if prj.exists() {
                fs::remove_file(&prj)?;
            }
        }
    }
    Ok(written)
}

/// Writes the catchment polygons to `dir/catchment_shapefile.shp`, in the
/// DEM's `crs`.
pub fn export_catchment(fc: &FeatureCollection, dir: &Path, crs: &Crs) -> Result<PathBuf> {
    let path = dir.join(CATCHMENT_FILE);
    let layer = VectorLayer::from_feature_collection("catchment", GeometryKind::Polygon, fc);
    let written = write_layer(&layer, &path, crs)?;
    info!("catchment: {} polygon(s) written to {}", written, path.display());
    Ok(path)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExport {
    pub threshold: i64,
    pub path: PathBuf,
    pub features: usize,
}

/// Outcome of [`NetworkExporter::run`]: one entry per threshold, in order.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub exported: Vec<ThresholdExport>,
    pub failed: Vec<(i64, Error)>,
}

impl SweepReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_thresholds(&self) -> Vec<i64> {
        self.failed.iter().map(|(t, _)| *t).collect()
    }
}

/// Exports stream networks from fixed routing grids.
///
/// The grids are only read, so every threshold starts from the same state.
pub struct NetworkExporter<'a> {
    pub fdir: &'a Array2<u8>,
    pub acc: &'a Array2<f64>,
    pub dirmap: &'a DirMap,
    pub transform: GeoTransform,
    /// The `Network_Branches` folder.
    pub base: PathBuf,
    /// Written as a `.prj` next to every network.
    pub crs: Crs,
}

impl<'a> NetworkExporter<'a> {
    pub fn new(
        fdir: &'a Array2<u8>,
        acc: &'a Array2<f64>,
        dirmap: &'a DirMap,
        transform: GeoTransform,
        base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fdir,
            acc,
            dirmap,
            transform,
            base: base.into(),
            crs: Crs::default(),
        }
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// Extracts the network of cells with accumulation above `threshold`
    /// and writes it to [`network_path`].
    pub fn export(&self, threshold: i64, mode: ThresholdMode) -> Result<ThresholdExport> {
        let limit = threshold as f64;
        let mask = self.acc.mapv(|a| a > limit);
        let fc = extract_river_network(self.fdir, &mask, self.dirmap, &self.transform);
        let layer = VectorLayer::from_feature_collection(
            &format!("{NETWORK_DIR}_{threshold}"),
            GeometryKind::LineString,
            &fc,
        );
        let path = network_path(&self.base, threshold, mode);
        let features = write_layer(&layer, &path, &self.crs)?;
        info!("threshold {}: {} branch(es) written to {}", threshold, features, path.display());
        Ok(ThresholdExport {
            threshold,
            path,
            features,
        })
    }

    /// Exports every threshold of `mode` in order. A failing threshold is
    /// logged and recorded; the remaining ones are still exported.
    pub fn run(&self, mode: ThresholdMode) -> SweepReport {
        let mut report = SweepReport::default();
        for threshold in mode.thresholds() {
            match self.export(threshold, mode) {
                Ok(export) => report.exported.push(export),
                Err(e) => {
                    warn!("threshold {}: export failed: {}", threshold, e);
                    report.failed.push((threshold, e));
                }
            }
        }
        report
    }
}
