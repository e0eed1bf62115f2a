#[cfg(test)]
mod tests {
    use catchment_delineate::{accumulation, extract_river_network, trace_branches, GeoTransform, DIRMAP};
    use geojson::{feature::Id, Value};
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

    fn y_acc() -> Array2<f64> {
        accumulation(&y_fdir(), &DIRMAP, &Array2::from_elem((5, 5), true))
    }

    #[test]
    fn test_branches_split_at_confluence() {
        let mask = y_acc().mapv(|a| a > 1.0);
        let branches = trace_branches(&y_fdir(), &mask, &DIRMAP);
        assert_eq!(
            branches,
            vec![
                vec![(1, 1), (2, 2)],
                vec![(1, 3), (2, 2)],
                vec![(2, 2), (3, 2), (4, 2)],
            ]
        );
    }

    #[test]
    fn test_branch_count_by_threshold() {
        let fdir = y_fdir();
        let acc = y_acc();
        let t = GeoTransform::new(0.0, 1.0, 5.0, -1.0);
        for (threshold, expected) in [(0.0, 3), (1.0, 3), (2.0, 1), (5.0, 1), (7.0, 0)] {
            let mask = acc.mapv(|a| a > threshold);
            let fc = extract_river_network(&fdir, &mask, &DIRMAP, &t);
            assert_eq!(fc.features.len(), expected, "threshold {threshold}");
        }
    }

    #[test]
    fn test_feature_geometry_and_properties() {
        let mask = y_acc().mapv(|a| a > 1.0);
        let t = GeoTransform::new(100.0, 10.0, 50.0, -10.0);
        let fc = extract_river_network(&y_fdir(), &mask, &DIRMAP, &t);
        assert_eq!(fc.features.len(), 3);

        let trunk = &fc.features[2];
        assert_eq!(trunk.id, Some(Id::Number(serde_json::Number::from(2u64))));
        match &trunk.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => assert_eq!(
                coords,
                &vec![vec![125.0, 25.0], vec![125.0, 15.0], vec![125.0, 5.0]]
            ),
            other => panic!("expected a LineString, got {other:?}"),
        }
        let properties = trunk.properties.as_ref().unwrap();
        let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "length"]);
        assert_eq!(properties["id"].as_i64(), Some(2));
        assert_eq!(properties["length"].as_f64(), Some(20.0));

        let tributary = fc.features[0].properties.as_ref().unwrap();
        let length = tributary["length"].as_f64().unwrap();
        assert!((length - 200.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_branch_stops_where_flow_leaves_mask() {
        let fdir: Array2<u8> = array![[1, 1, 1, 1, 0]];
        let mask = array![[true, true, false, true, true]];
        let branches = trace_branches(&fdir, &mask, &DIRMAP);
        assert_eq!(branches, vec![vec![(0, 0), (0, 1)], vec![(0, 3), (0, 4)]]);
    }

    #[test]
    fn test_empty_mask() {
        let mask = Array2::from_elem((5, 5), false);
        let fc = extract_river_network(&y_fdir(), &mask, &DIRMAP, &GeoTransform::new(0.0, 1.0, 5.0, -1.0));
        assert!(fc.features.is_empty());
    }
}
