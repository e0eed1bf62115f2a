#[cfg(test)]
mod tests {
    use catchment_delineate::{
        accumulation, bounding_window, catchment, delineate, polygonize, snap_to_mask, Error, GeoTransform,
        Window, DIRMAP,
    };
    use ndarray::{Array2, array};

    fn y_fdir() -> Array2<u8> {
        array![
            [2, 0, 0, 0, 8],
            [0, 2, 0, 8, 0],
            [0, 0, 4, 0, 0],
            [0, 0, 4, 0, 0],
            [0, 0, 0, 0, 0],
        ]
    }

    // cell (row, col) has its centre at (col + 0.5, 4.5 - row)
    fn unit_transform() -> GeoTransform {
        GeoTransform::new(0.0, 1.0, 5.0, -1.0)
    }

    #[test]
    fn test_snap_to_nearest_cell() {
        let mask = array![
            [false, false, false],
            [false, false, true],
            [true,  false, false],
        ];
        let t = GeoTransform::new(0.0, 1.0, 3.0, -1.0);
        assert_eq!(snap_to_mask(&mask, &t, (2.9, 2.9)).unwrap(), (2.5, 1.5));
        assert_eq!(snap_to_mask(&mask, &t, (0.0, 0.0)).unwrap(), (0.5, 0.5));
    }

    #[test]
    fn test_snap_tie_takes_first_in_row_order() {
        let mask = array![
            [true,  false, true],
        ];
        let t = GeoTransform::new(0.0, 1.0, 1.0, -1.0);
        assert_eq!(snap_to_mask(&mask, &t, (1.5, 0.5)).unwrap(), (0.5, 0.5));
    }

    #[test]
    fn test_snap_without_channels() {
        let mask = Array2::from_elem((3, 3), false);
        let t = GeoTransform::new(0.0, 1.0, 3.0, -1.0);
        assert!(matches!(snap_to_mask(&mask, &t, (1.0, 1.0)), Err(Error::NoChannelCell)));
    }

    #[test]
    fn test_catchment_of_confluence() {
        let fdir = y_fdir();
        let mask = catchment(&fdir, &DIRMAP, &unit_transform(), (2.5, 2.5)).unwrap();
        let expected = array![
            [true,  false, false, false, true],
            [false, true,  false, true,  false],
            [false, false, true,  false, false],
            [false, false, false, false, false],
            [false, false, false, false, false],
        ];
        assert_eq!(mask, expected);

        let outlet = catchment(&fdir, &DIRMAP, &unit_transform(), (2.5, 0.5)).unwrap();
        assert_eq!(outlet.iter().filter(|&&v| v).count(), 7);
    }

    #[test]
    fn test_catchment_outside_grid() {
        let fdir = y_fdir();
        let result = catchment(&fdir, &DIRMAP, &unit_transform(), (7.0, 2.0));
        assert!(matches!(result, Err(Error::OutsideExtent { .. })));
    }

    #[test]
    fn test_bounding_window() {
        let mask = array![
            [false, false, false, false],
            [false, true,  false, false],
            [false, false, true,  false],
        ];
        assert_eq!(
            bounding_window(&mask),
            Some(Window { row0: 1, col0: 1, rows: 2, cols: 2 })
        );
        assert_eq!(bounding_window(&Array2::from_elem((2, 2), false)), None);
    }

    #[test]
    fn test_polygonize_single_cell() {
        let mask = array![[true]];
        let t = GeoTransform::new(0.0, 1.0, 1.0, -1.0);
        let polygons = polygonize(&mask, &t);
        assert_eq!(
            polygons,
            vec![vec![vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0]]]]
        );
    }

    #[test]
    fn test_polygonize_drops_collinear_vertices() {
        let mask = Array2::from_elem((2, 3), true);
        let t = GeoTransform::new(10.0, 2.0, 20.0, -2.0);
        let polygons = polygonize(&mask, &t);
        assert_eq!(
            polygons,
            vec![vec![vec![[10.0, 20.0], [16.0, 20.0], [16.0, 16.0], [10.0, 16.0], [10.0, 20.0]]]]
        );
    }

    #[test]
    fn test_polygonize_diagonal_cells_are_separate() {
        let mask = array![
            [true,  false],
            [false, true],
        ];
        let polygons = polygonize(&mask, &GeoTransform::new(0.0, 1.0, 2.0, -1.0));
        assert_eq!(polygons.len(), 2);
        for polygon in &polygons {
            assert_eq!(polygon.len(), 1);
            assert_eq!(polygon[0].len(), 5);
        }
    }

    #[test]
    fn test_polygonize_with_hole() {
        let mask = array![
            [true, true,  true],
            [true, false, true],
            [true, true,  true],
        ];
        let polygons = polygonize(&mask, &GeoTransform::new(0.0, 1.0, 3.0, -1.0));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].len(), 2);
        assert_eq!(polygons[0][0].len(), 5);
        let mut hole = polygons[0][1].clone();
        assert_eq!(hole.first(), hole.last());
        hole.pop();
        hole.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(hole, vec![[1.0, 1.0], [1.0, 2.0], [2.0, 1.0], [2.0, 2.0]]);
    }

    #[test]
    fn test_delineate_feature_collection() {
        let fdir = y_fdir();
        let acc = accumulation(&fdir, &DIRMAP, &Array2::from_elem((5, 5), true));
        let channels = acc.mapv(|a| a > 4.0);
        let t = unit_transform();

        // (2.9, 1.9) lies in cell (3, 2), the nearest channel cell
        let c = delineate(&fdir, &channels, &DIRMAP, &t, (2.9, 1.9)).unwrap();
        assert_eq!(c.outlet, (2.5, 1.5));
        assert_eq!(c.cell_count(), 6);
        assert_eq!(c.window, Window { row0: 0, col0: 0, rows: 4, cols: 5 });

        // cells linked only diagonally give one polygon each, except the
        // vertical pair (2, 2)-(3, 2)
        let fc = c.to_feature_collection();
        assert_eq!(fc.features.len(), 5);
        let areas: f64 = fc
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["area"].as_f64().unwrap())
            .sum();
        assert_eq!(areas, 6.0);
        assert_eq!(c.area(), areas);
        let ids: Vec<i64> = fc
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
