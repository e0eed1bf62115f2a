use anyhow::Result;
use ndarray::Array2;
use tempfile::TempDir;
use catchment_delineate::{array_to_rasterfile, Crs, GeoTransform, Raster};
use catchment_delineate::config::{PourPointSource, RunConfig, ThresholdMode};
use catchment_delineate::pipeline::run;

fn main() -> Result<()> {
    // V-shaped valley, 1 m cells, draining south down the middle column
    let data = Array2::from_shape_fn((60, 41), |(r, c)| (c as f64 - 20.0).abs() + 0.1 * (59 - r) as f64);
    let dem = Raster {
        data,
        nodata: -9999.0,
        transform: GeoTransform::new(300000.0, 1.0, 510000.0, -1.0),
        crs: Crs::projected(27700),
    };

    let tmp = TempDir::new()?;
    let dem_path = tmp.path().join("valley.tif");
    println!("Writing DEM to {:?}", dem_path);
    array_to_rasterfile(&dem, &dem_path)?;

    let mut config = RunConfig::new(&dem_path, ThresholdMode::All);
    config.pour_point = PourPointSource::Fixed(300020.7, 509944.2);
    config.output_dir = tmp.path().to_path_buf();
    let summary = run(&config)?;

    println!("Outlet snapped to {:?}", summary.outlet);
    println!(
        "Catchment of {} cells ({} m2) in {:?}",
        summary.catchment_cells, summary.catchment_area, summary.catchment_path
    );
    for network in &summary.networks {
        println!("  threshold {:>4}: {} branch(es)", network.threshold, network.features);
    }

    tmp.close()?;
    Ok(())
}
