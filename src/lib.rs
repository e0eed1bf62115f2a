//! # Catchment-delineate
//!
//! `catchment-delineate` delineates the catchment draining to a pour point on
//! a DEM and extracts its stream network at one or more flow-accumulation
//! thresholds, writing both as shapefiles. It is the library behind the
//! `delineate` command, and its hydrology functions work on plain
//! [`ndarray::Array2`] grids so they can be called from your code.
//!
//! ## Example
//!
//! ```
//! use ndarray::Array2;
//! use catchment_delineate::{accumulation, condition, flowdir, DIRMAP};
//!
//! let mut dem = Array2::from_shape_vec(
//!     (3, 3),
//!     vec![
//!         10.0, 12.0, 10.0,
//!         12.0, 9.0,  12.0,
//!         10.0, 12.0, 8.0,
//!     ],
//! ).expect("Failed to create DEM");
//!
//! let nodata = -9999.0;
//! condition(&mut dem, nodata);
//! let fdir = flowdir(&dem, nodata, 1.0, 1.0, &DIRMAP);
//! let acc = accumulation(&fdir, &DIRMAP, &dem.mapv(|z| z != nodata));
//! assert_eq!(acc[[2, 2]], 9.0);
//! ```
pub mod catchment;
pub mod cli;
pub mod conditioning;
pub mod config;
pub mod error;
pub mod export;
pub mod network;
pub mod picker;
pub mod pipeline;
pub mod raster;
pub mod routing;
pub mod vector;

pub use catchment::{bounding_window, catchment, delineate, polygonize, snap_to_mask, Catchment};
pub use conditioning::{condition, fill_depressions, fill_pits, resolve_flats, ConditioningReport};
pub use error::{Error, Result};
pub use export::{export_catchment, network_path, NetworkExporter, SweepReport, ThresholdExport};
pub use network::{extract_river_network, trace_branches};
pub use raster::{array_to_rasterfile, rasterfile_to_array, Crs, Extent, GeoTransform, Raster, RasterValue, Window};
pub use routing::{accumulation, downstream, flowdir, DirMap, DIRMAP, NO_FLOW};
pub use vector::{FieldDef, FieldKind, GeometryKind, LayerFeature, VectorLayer};
