#[cfg(test)]
mod tests {
    use catchment_delineate::{
        array_to_rasterfile, rasterfile_to_array, Crs, Error, Extent, GeoTransform, Raster, Window,
    };
    use ndarray::array;

    fn dem() -> Raster<f64> {
        Raster {
            data: array![
                [10.0, 11.5, -9999.0],
                [9.25, 8.0,  7.5],
            ],
            nodata: -9999.0,
            transform: GeoTransform::new(350000.0, 2.0, 520000.0, -2.0),
            crs: Crs::projected(27700),
        }
    }

    #[test]
    fn test_roundtrip_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        let raster = dem();
        array_to_rasterfile(&raster, &path).unwrap();

        let back = rasterfile_to_array::<f64>(&path).unwrap();
        assert_eq!(back.data, raster.data);
        assert_eq!(back.nodata, -9999.0);
        assert_eq!(back.transform, raster.transform);
        assert_eq!(back.crs.epsg, Some(27700));
        assert_eq!(back.crs.to_string(), "EPSG:27700");
    }

    #[test]
    fn test_read_integer_samples_as_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.tif");
        let raster: Raster<u8> = Raster {
            data: array![[1, 2], [3, 255]],
            nodata: 255,
            transform: GeoTransform::new(0.0, 10.0, 100.0, -10.0),
            crs: Crs::projected(32630),
        };
        array_to_rasterfile(&raster, &path).unwrap();

        let back = rasterfile_to_array::<f64>(&path).unwrap();
        assert_eq!(back.data, array![[1.0, 2.0], [3.0, 255.0]]);
        assert_eq!(back.nodata, 255.0);
        assert_eq!(back.valid_mask(), array![[true, true], [true, false]]);
    }

    #[test]
    fn test_missing_crs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nocrs.tif");
        let mut raster = dem();
        raster.crs = Crs::default();
        array_to_rasterfile(&raster, &path).unwrap();

        let result = rasterfile_to_array::<f64>(&path);
        assert!(matches!(result, Err(Error::UndefinedCrs { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = rasterfile_to_array::<f64>(&dir.path().join("absent.tif"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_transform_and_extent() {
        let raster = dem();
        let t = raster.transform;
        assert_eq!(t.cell_center(1, 2), (350005.0, 519997.0));
        assert_eq!(t.cell_of(350005.0, 519997.0), (1, 2));
        assert_eq!(t.cell_of(349999.0, 520001.0), (-1, -1));
        assert_eq!(t.cell_area(), 4.0);
        assert_eq!(GeoTransform::from_gdal(t.to_gdal()), t);
        assert_eq!(
            raster.extent(),
            Extent { xmin: 350000.0, xmax: 350006.0, ymin: 519996.0, ymax: 520000.0 }
        );
    }

    #[test]
    fn test_window() {
        let raster = dem();
        let w = Window { row0: 1, col0: 1, rows: 1, cols: 2 };
        assert_eq!(w.slice(&raster.data), array![[8.0, 7.5]]);
        let t = raster.transform.window(&w);
        assert_eq!(t, GeoTransform::new(350002.0, 2.0, 519998.0, -2.0));
        assert_eq!(
            t.extent(w.rows, w.cols),
            Extent { xmin: 350002.0, xmax: 350006.0, ymin: 519996.0, ymax: 519998.0 }
        );
    }

    #[test]
    fn test_projection_wkt() {
        let wkt = Crs::projected(27700).wkt().unwrap();
        assert!(wkt.starts_with("PROJCS["));
        assert_eq!(Crs::default().wkt(), None);
    }
}
