#[cfg(test)]
mod tests {
    use catchment_delineate::{accumulation, downstream, flowdir, DirMap, DIRMAP, NO_FLOW};
    use ndarray::{Array2, array};

    // two tributaries meeting at (2, 2) and leaving through (4, 2)
    fn y_fdir() -> Array2<u8> {
        array![
            [2, 0, 0, 0, 8],
            [0, 2, 0, 8, 0],
            [0, 0, 4, 0, 0],
            [0, 0, 4, 0, 0],
            [0, 0, 0, 0, 0],
        ]
    }

    #[test]
    fn test_each_direction_code() {
        let nodata = -999.0;
        let offsets = [(-1, 0), (-1, 1), (0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1)];
        for (n, (dr, dc)) in offsets.iter().enumerate() {
            let mut dem: Array2<f64> = Array2::from_elem((3, 3), 9.0);
            dem[[1, 1]] = 5.0;
            dem[[(1 + dr) as usize, (1 + dc) as usize]] = 1.0;
            let fdir = flowdir(&dem, nodata, 8.0, 8.0, &DIRMAP);
            assert_eq!(fdir[[1, 1]], DIRMAP.0[n]);
            assert_eq!(DIRMAP.offset(fdir[[1, 1]]), Some((*dr, *dc)));
        }
    }

    #[test]
    fn test_tie_goes_to_first_direction() {
        let nodata = -999.0;
        let dem: Array2<f64> = array![
            [9.0, 4.0, 9.0],
            [9.0, 5.0, 4.0],
            [9.0, 9.0, 9.0],
        ];
        let fdir = flowdir(&dem, nodata, 1.0, 1.0, &DIRMAP);
        assert_eq!(fdir[[1, 1]], 64);
    }

    #[test]
    fn test_steepest_uses_diagonal_distance() {
        let nodata = -999.0;
        // diagonal drop 3/sqrt(2) beats orthogonal drop 2
        let dem: Array2<f64> = array![
            [9.0, 9.0, 9.0],
            [9.0, 5.0, 3.0],
            [9.0, 9.0, 2.0],
        ];
        let fdir = flowdir(&dem, nodata, 1.0, 1.0, &DIRMAP);
        assert_eq!(fdir[[1, 1]], 2);
    }

    #[test]
    fn test_nodata_and_outlets() {
        let nodata = -999.0;
        let dem: Array2<f64> = array![
            [5.0, nodata],
            [9.0, 9.0],
        ];
        let fdir = flowdir(&dem, nodata, 1.0, 1.0, &DIRMAP);
        assert_eq!(fdir, array![[NO_FLOW, NO_FLOW], [64, 32]]);
    }

    #[test]
    fn test_custom_dirmap() {
        let nodata = -999.0;
        let dirmap = DirMap([1, 2, 3, 4, 5, 6, 7, 8]);
        let dem: Array2<f64> = array![[3.0, 2.0, 1.0]];
        let fdir = flowdir(&dem, nodata, 1.0, 1.0, &dirmap);
        assert_eq!(fdir, array![[3, 3, 0]]);
        assert_eq!(downstream(&fdir, &dirmap, 0, 0), Some((0, 1)));
    }

    #[test]
    fn test_downstream() {
        let fdir = y_fdir();
        assert_eq!(downstream(&fdir, &DIRMAP, 0, 0), Some((1, 1)));
        assert_eq!(downstream(&fdir, &DIRMAP, 1, 3), Some((2, 2)));
        assert_eq!(downstream(&fdir, &DIRMAP, 4, 2), None);

        let off_grid: Array2<u8> = array![[64]];
        assert_eq!(downstream(&off_grid, &DIRMAP, 0, 0), None);
        assert_eq!(DIRMAP.offset(3), None);
    }

    #[test]
    fn test_accumulation_line() {
        let nodata = -999.0;
        let dem: Array2<f64> = array![[4.0, 3.0, 2.0, 1.0]];
        let fdir = flowdir(&dem, nodata, 1.0, 1.0, &DIRMAP);
        let acc = accumulation(&fdir, &DIRMAP, &dem.mapv(|z| z != nodata));
        assert_eq!(acc, array![[1.0, 2.0, 3.0, 4.0]]);
    }

    #[test]
    fn test_accumulation_confluence() {
        let fdir = y_fdir();
        let valid = Array2::from_elem((5, 5), true);
        let acc = accumulation(&fdir, &DIRMAP, &valid);
        assert_eq!(acc[[1, 1]], 2.0);
        assert_eq!(acc[[1, 3]], 2.0);
        assert_eq!(acc[[2, 2]], 5.0);
        assert_eq!(acc[[3, 2]], 6.0);
        assert_eq!(acc[[4, 2]], 7.0);
        assert_eq!(acc[[4, 4]], 1.0);
        assert_eq!(acc.sum(), 42.0);
    }

    #[test]
    fn test_accumulation_skips_invalid_cells() {
        let nodata = -999.0;
        let dem: Array2<f64> = array![[nodata, 3.0, 2.0, 1.0]];
        let fdir = flowdir(&dem, nodata, 1.0, 1.0, &DIRMAP);
        let acc = accumulation(&fdir, &DIRMAP, &dem.mapv(|z| z != nodata));
        assert_eq!(acc, array![[0.0, 1.0, 2.0, 3.0]]);
    }
}
