#[cfg(test)]
mod tests {
    use std::path::Path;

    use catchment_delineate::config::{NetworkExtent, PourPointSource, RunConfig, ThresholdMode};
    use catchment_delineate::pipeline::{run, Hydrology};
    use catchment_delineate::{array_to_rasterfile, Crs, Error, GeoTransform, Raster};
    use ndarray::Array2;
    use shapefile::dbase;

    const ROWS: usize = 60;
    const COLS: usize = 41;

    // a V-shaped valley draining south along column 20
    fn valley() -> Raster<f64> {
        let data = Array2::from_shape_fn((ROWS, COLS), |(r, c)| {
            (c as f64 - 20.0).abs() + 0.1 * (ROWS - 1 - r) as f64
        });
        Raster {
            data,
            nodata: -9999.0,
            transform: GeoTransform::new(300000.0, 1.0, 510000.0, -1.0),
            crs: Crs::projected(27700),
        }
    }

    fn write_valley(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("valley.tif");
        array_to_rasterfile(&valley(), &path).unwrap();
        path
    }

    fn config(dir: &Path, mode: ThresholdMode) -> RunConfig {
        let mut config = RunConfig::new(write_valley(dir), mode);
        config.pour_point = PourPointSource::Fixed(300020.7, 509944.2);
        config.output_dir = dir.join("out");
        config
    }

    #[test]
    fn test_valley_routing() {
        let hydrology = Hydrology::from_dem(valley());
        assert_eq!(hydrology.conditioning.depression_cells_raised, 0);
        assert_eq!(hydrology.acc[[ROWS - 1, 20]], (ROWS * COLS) as f64);
        assert_eq!(hydrology.acc[[0, 20]], COLS as f64);
        assert_eq!(hydrology.acc[[10, 5]], 6.0);
        assert_eq!(hydrology.fdir[[10, 5]], 1);
        assert_eq!(hydrology.fdir[[10, 30]], 16);
        assert_eq!(hydrology.fdir[[10, 20]], 4);
        assert_eq!(hydrology.fdir[[ROWS - 1, 20]], 0);
    }

    #[test]
    fn test_run_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), ThresholdMode::All);
        let summary = run(&config).unwrap();

        assert_eq!(summary.outlet, (300020.5, 509944.5));
        assert_eq!(summary.catchment_cells, 56 * COLS);
        assert_eq!(summary.catchment_area, (56 * COLS) as f64);
        assert_eq!(
            summary.catchment_path,
            dir.path().join("out/CatchmentShapefile/catchment_shapefile.shp")
        );
        let polygons = shapefile::read_shapes(&summary.catchment_path).unwrap();
        assert_eq!(polygons.len(), 1);
        let reader = dbase::Reader::from_path(summary.catchment_path.with_extension("dbf")).unwrap();
        let names: Vec<&str> = reader.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["id", "area"]);
        assert!(summary.catchment_path.with_extension("prj").exists());

        assert_eq!(summary.networks.len(), 6);
        for network in &summary.networks {
            let t = network.threshold;
            assert_eq!(
                network.path,
                dir.path()
                    .join(format!("out/Network_Branches/Network_Branches_{t}/Network_Branches_{t}.shp"))
            );
            assert_eq!(network.features, 1, "threshold {t}");
            assert_eq!(shapefile::read_shapes(&network.path).unwrap().len(), 1);
            assert!(network.path.with_extension("prj").exists());
        }
    }

    #[test]
    fn test_run_single_threshold_full_extent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), ThresholdMode::Single(2500));
        config.network_extent = NetworkExtent::Full;
        let summary = run(&config).unwrap();

        assert_eq!(summary.networks.len(), 1);
        let network = &summary.networks[0];
        assert_eq!(network.path, dir.path().join("out/Network_Branches/Network_Branches_2500.shp"));
        assert_eq!(network.features, 0);
        assert!(network.path.exists());
    }

    #[test]
    fn test_catchment_extent_limits_network() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = config(dir.path(), ThresholdMode::Single(2300));
        let clipped = run(&config).unwrap();
        assert_eq!(clipped.networks[0].features, 0);

        config.network_extent = NetworkExtent::Full;
        let full = run(&config).unwrap();
        assert_eq!(full.networks[0].features, 1);
    }

    #[test]
    fn test_pour_point_outside_channels_snaps() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), ThresholdMode::Single(100));
        // on the hillside, nearest channel cell is (30, 20)
        config.pour_point = PourPointSource::Fixed(300005.0, 509969.5);
        let summary = run(&config).unwrap();
        assert_eq!(summary.outlet, (300020.5, 509969.5));
        assert_eq!(summary.catchment_cells, 31 * COLS);
    }

    #[test]
    fn test_missing_raster() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::new(dir.path().join("absent.tif"), ThresholdMode::All);
        config.pour_point = PourPointSource::Fixed(0.0, 0.0);
        assert!(matches!(run(&config), Err(Error::Io(_))));
    }
}
