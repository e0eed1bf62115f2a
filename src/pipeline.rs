//! The full delineation run: load, condition, route, delineate, export.
use std::path::PathBuf;

use ndarray::{Array2, Zip};
use tracing::{debug, info, warn};

use crate::catchment::{delineate, Catchment};
use crate::conditioning::{condition, ConditioningReport};
use crate::config::{NetworkExtent, PourPointSource, RunConfig, SNAP_THRESHOLD};
use crate::error::{Error, Result};
use crate::export::{export_catchment, NetworkExporter, ThresholdExport};
use crate::network::extract_river_network;
use crate::picker::{pick_pour_point, show_channels};
use crate::raster::{rasterfile_to_array, GeoTransform, Raster};
use crate::routing::{accumulation, flowdir, DIRMAP};

/// Conditioned DEM and the routing grids derived from it.
#[derive(Debug, Clone)]
pub struct Hydrology {
    pub dem: Raster<f64>,
    pub fdir: Array2<u8>,
    pub acc: Array2<f64>,
    pub conditioning: ConditioningReport,
}

impl Hydrology {
    pub fn from_dem(mut dem: Raster<f64>) -> Self {
        let conditioning = condition(&mut dem.data, dem.nodata);
        debug!(
            "conditioning: {} pit(s) filled, {} cell(s) raised, {} flat cell(s) resolved",
            conditioning.pits_filled, conditioning.depression_cells_raised, conditioning.flat_cells_resolved
        );
        let t = dem.transform;
        let fdir = flowdir(&dem.data, dem.nodata, t.dx.abs(), t.dy.abs(), &DIRMAP);
        let acc = accumulation(&fdir, &DIRMAP, &dem.valid_mask());
        Self {
            dem,
            fdir,
            acc,
            conditioning,
        }
    }

    pub fn transform(&self) -> GeoTransform {
        self.dem.transform
    }

    /// Cells eligible as a snapped pour point.
    pub fn channels(&self) -> Array2<bool> {
        self.acc.mapv(|a| a > SNAP_THRESHOLD)
    }

    /// Routing grids cropped to the catchment's window, with accumulation
    /// outside the catchment blanked so no threshold selects it.
    pub fn clip_to(&self, catchment: &Catchment) -> (Array2<u8>, Array2<f64>, GeoTransform) {
        let w = catchment.window;
        let fdir = w.slice(&self.fdir).to_owned();
        let mut acc = w.slice(&self.acc).to_owned();
        Zip::from(&mut acc)
            .and(w.slice(&catchment.mask))
            .for_each(|a, &inside| {
                if !inside {
                    *a = f64::NAN;
                }
            });
        (fdir, acc, self.dem.transform.window(&w))
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pour_point: (f64, f64),
    pub outlet: (f64, f64),
    pub catchment_cells: usize,
    /// In map units.
    pub catchment_area: f64,
    pub catchment_path: PathBuf,
    pub networks: Vec<ThresholdExport>,
}

/// Runs the whole delineation described by `config`.
///
/// Every threshold is attempted even if an earlier one fails; any failure
/// is reported afterwards as [`Error::SweepFailed`]. When the pour point was
/// picked interactively, the channels above the snapping threshold are shown
/// once the networks are written.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let dem = rasterfile_to_array::<f64>(&config.raster)?;
    let (rows, cols) = dem.shape();
    info!("loaded {} ({}x{}), crs {}", config.raster.display(), rows, cols, dem.crs);

    let hydrology = Hydrology::from_dem(dem);
    info!("flow direction and accumulation computed");

    let pour_point = match config.pour_point {
        PourPointSource::Fixed(x, y) => (x, y),
        PourPointSource::Interactive => {
            let (x, y) = pick_pour_point(&hydrology.acc, hydrology.dem.extent())?;
            (x as f64, y as f64)
        }
    };

    let catchment = delineate(
        &hydrology.fdir,
        &hydrology.channels(),
        &DIRMAP,
        &hydrology.transform(),
        pour_point,
    )?;
    info!(
        "catchment at ({}, {}): {} cells, area {}, {} polygon(s)",
        catchment.outlet.0,
        catchment.outlet.1,
        catchment.cell_count(),
        catchment.area(),
        catchment.polygons.len()
    );
    let crs = &hydrology.dem.crs;
    let catchment_path = export_catchment(&catchment.to_feature_collection(), &config.catchment_dir(), crs)?;

    let (fdir, acc, transform) = match config.network_extent {
        NetworkExtent::Catchment => hydrology.clip_to(&catchment),
        NetworkExtent::Full => (hydrology.fdir.clone(), hydrology.acc.clone(), hydrology.transform()),
    };
    let exporter =
        NetworkExporter::new(&fdir, &acc, &DIRMAP, transform, config.network_dir()).with_crs(crs.clone());
    let report = exporter.run(config.mode);
    if !report.is_success() {
        return Err(Error::SweepFailed(report.failed_thresholds()));
    }

    if config.pour_point == PourPointSource::Interactive {
        let channels = extract_river_network(&fdir, &acc.mapv(|a| a > SNAP_THRESHOLD), &DIRMAP, &transform);
        let (rows, cols) = fdir.dim();
        // the outputs are already written, a viewer failure does not undo them
        if let Err(e) = show_channels(&channels, rows, cols, transform.extent(rows, cols)) {
            warn!("channel preview unavailable: {}", e);
        }
    }

    Ok(RunSummary {
        pour_point,
        outlet: catchment.outlet,
        catchment_cells: catchment.cell_count(),
        catchment_area: catchment.area(),
        catchment_path,
        networks: report.exported,
    })
}
