//! Catchment delineation: snap a pour point onto a channel, trace everything
//! upstream of it, crop to the result and turn it into polygons.
use std::collections::{HashMap, VecDeque};

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Window};
use crate::routing::{downstream, DirMap};

const D8: [(isize, isize); 8] = [(-1, 0), (-1, 1), (0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1)];

/// A closed ring of map coordinates.
pub type Ring = Vec<[f64; 2]>;
/// Exterior ring followed by any holes.
pub type PolygonRings = Vec<Ring>;

/// Moves `point` to the centre of the nearest cell where `mask` is set.
///
/// Distance is Euclidean in map units; ties go to the first cell in row-major
/// order. Fails with [`Error::NoChannelCell`] when no cell is set.
pub fn snap_to_mask(mask: &Array2<bool>, transform: &GeoTransform, point: (f64, f64)) -> Result<(f64, f64)> {
    let (x, y) = point;
    let mut best: Option<((f64, f64), f64)> = None;
    for ((row, col), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        let (cx, cy) = transform.cell_center(row, col);
        let d2 = (cx - x).powi(2) + (cy - y).powi(2);
        if best.is_none_or(|(_, bd)| d2 < bd) {
            best = Some(((cx, cy), d2));
        }
    }
    best.map(|(p, _)| p).ok_or(Error::NoChannelCell)
}

/// Every cell that drains into the cell containing `point`, that cell included.
pub fn catchment(
    fdir: &Array2<u8>,
    dirmap: &DirMap,
    transform: &GeoTransform,
    point: (f64, f64),
) -> Result<Array2<bool>> {
    let (rows, columns) = fdir.dim();
    let (row, col) = transform.cell_of(point.0, point.1);
    if row < 0 || col < 0 || row >= rows as isize || col >= columns as isize {
        return Err(Error::OutsideExtent { x: point.0, y: point.1 });
    }
    let (row, col) = (row as usize, col as usize);

    let mut mask = Array2::<bool>::from_elem((rows, columns), false);
    mask[[row, col]] = true;
    let mut queue = VecDeque::from([(row, col)]);
    while let Some((r, c)) = queue.pop_front() {
        for &(dr, dc) in &D8 {
            let rn = r as isize + dr;
            let cn = c as isize + dc;
            if rn < 0 || cn < 0 || rn >= rows as isize || cn >= columns as isize {
                continue;
            }
            let (rn, cn) = (rn as usize, cn as usize);
            if !mask[[rn, cn]] && downstream(fdir, dirmap, rn, cn) == Some((r, c)) {
                mask[[rn, cn]] = true;
                queue.push_back((rn, cn));
            }
        }
    }
    Ok(mask)
}

/// Smallest window holding every set cell of `mask`.
pub fn bounding_window(mask: &Array2<bool>) -> Option<Window> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for ((row, col), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        bounds = Some(match bounds {
            None => (row, row, col, col),
            Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
        });
    }
    bounds.map(|(r0, r1, c0, c1)| Window {
        row0: r0,
        col0: c0,
        rows: r1 - r0 + 1,
        cols: c1 - c0 + 1,
    })
}

/// Vectorises the 4-connected regions of `mask` into polygons.
///
/// Rings run along cell edges, so vertices sit on cell corners. Each polygon
/// lists its exterior ring first, then its holes; every ring is closed and
/// has no collinear vertices. Cells touching only at a corner end up in
/// separate polygons.
pub fn polygonize(mask: &Array2<bool>, transform: &GeoTransform) -> Vec<PolygonRings> {
    let (rows, columns) = mask.dim();
    let set = |r: isize, c: isize| {
        r >= 0 && c >= 0 && r < rows as isize && c < columns as isize && mask[[r as usize, c as usize]]
    };

    // directed edges between corner vertices, region always on the right
    let mut edges: Vec<((isize, isize), (isize, isize))> = Vec::new();
    for ((row, col), &inside) in mask.indexed_iter() {
        if !inside {
            continue;
        }
        let (r, c) = (row as isize, col as isize);
        if !set(r - 1, c) {
            edges.push(((r, c), (r, c + 1)));
        }
        if !set(r, c + 1) {
            edges.push(((r, c + 1), (r + 1, c + 1)));
        }
        if !set(r + 1, c) {
            edges.push(((r + 1, c + 1), (r + 1, c)));
        }
        if !set(r, c - 1) {
            edges.push(((r + 1, c), (r, c)));
        }
    }
    let mut outgoing: HashMap<(isize, isize), Vec<usize>> = HashMap::new();
    for (i, (start, _)) in edges.iter().enumerate() {
        outgoing.entry(*start).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings: Vec<Vec<(isize, isize)>> = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = first;
        loop {
            used[current] = true;
            let (start, end) = edges[current];
            ring.push(start);
            let heading = (end.0 - start.0, end.1 - start.1);
            let candidates = outgoing.get(&end).map(Vec::as_slice).unwrap_or(&[]);
            // prefer turning right, then straight on, then left
            let turns = [(heading.1, -heading.0), heading, (-heading.1, heading.0)];
            let next = turns.iter().find_map(|turn| {
                candidates.iter().copied().find(|&e| {
                    (!used[e] || e == first)
                        && (edges[e].1.0 - edges[e].0.0, edges[e].1.1 - edges[e].0.1) == *turn
                })
            });
            match next {
                Some(e) if e != first => current = e,
                _ => break,
            }
        }
        rings.push(simplify(ring));
    }

    // exteriors wind clockwise in (col, row) space, holes the other way
    let mut polygons: Vec<(f64, Vec<Vec<(isize, isize)>>)> = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        let area = signed_area(&ring);
        if area > 0.0 {
            polygons.push((area, vec![ring]));
        } else {
            holes.push(ring);
        }
    }
    for hole in holes {
        // centre of the empty cell to the left of the hole's first edge
        let (a, b) = (hole[0], hole[1 % hole.len()]);
        let heading = ((b.0 - a.0).signum(), (b.1 - a.1).signum());
        let sample = (
            a.0 as f64 + 0.5 * heading.0 as f64 - 0.5 * heading.1 as f64,
            a.1 as f64 + 0.5 * heading.1 as f64 + 0.5 * heading.0 as f64,
        );
        let owner = polygons
            .iter()
            .enumerate()
            .filter(|(_, (_, rings))| contains(&rings[0], sample))
            .min_by(|(_, (x, _)), (_, (y, _))| x.total_cmp(y))
            .map(|(i, _)| i);
        match owner {
            Some(i) => polygons[i].1.push(hole),
            None => debug!("dropping hole ring with no enclosing exterior"),
        }
    }

    polygons
        .into_iter()
        .map(|(_, rings)| {
            rings
                .into_iter()
                .map(|ring| {
                    let mut coords: Ring = ring
                        .iter()
                        .map(|&(r, c)| {
                            let (x, y) = transform.cell_corner(r as usize, c as usize);
                            [x, y]
                        })
                        .collect();
                    if let Some(&first) = coords.first() {
                        coords.push(first);
                    }
                    coords
                })
                .collect()
        })
        .collect()
}

/// Drops vertices where the ring runs straight on.
fn simplify(ring: Vec<(isize, isize)>) -> Vec<(isize, isize)> {
    let n = ring.len();
    if n < 3 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let here = ring[i];
            let next = ring[(i + 1) % n];
            let into = (here.0 - prev.0, here.1 - prev.1);
            let out = (next.0 - here.0, next.1 - here.1);
            into.0 * out.1 - into.1 * out.0 != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// Shoelace area with x = column, y = row.
fn signed_area(ring: &[(isize, isize)]) -> f64 {
    let n = ring.len();
    let twice: isize = (0..n)
        .map(|i| {
            let (r0, c0) = ring[i];
            let (r1, c1) = ring[(i + 1) % n];
            c0 * r1 - c1 * r0
        })
        .sum();
    twice as f64 / 2.0
}

/// Even-odd test of a `(row, col)` point against a ring.
fn contains(ring: &[(isize, isize)], point: (f64, f64)) -> bool {
    let (py, px) = point;
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (yi, xi) = (ring[i].0 as f64, ring[i].1 as f64);
        let (yj, xj) = (ring[(i + n - 1) % n].0 as f64, ring[(i + n - 1) % n].1 as f64);
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }
    inside
}

/// Result of [`delineate`].
#[derive(Debug, Clone)]
pub struct Catchment {
    /// Pour point after snapping, in map units.
    pub outlet: (f64, f64),
    /// Catchment cells over the full grid.
    pub mask: Array2<bool>,
    /// Crop of the grid to the catchment.
    pub window: Window,
    pub polygons: Vec<PolygonRings>,
    /// Area of one cell in map units.
    pub cell_area: f64,
}

impl Catchment {
    pub fn cell_count(&self) -> usize {
        self.mask.iter().filter(|&&v| v).count()
    }

    /// Total area in map units, the sum of the polygons' `area` properties.
    pub fn area(&self) -> f64 {
        self.cell_count() as f64 * self.cell_area
    }

    /// Polygons as features with an `id` and their `area` in map units.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .polygons
            .iter()
            .enumerate()
            .map(|(id, rings)| {
                let area: f64 = rings
                    .iter()
                    .enumerate()
                    .map(|(i, ring)| if i == 0 { ring_area(ring) } else { -ring_area(ring) })
                    .sum();
                let mut properties = JsonObject::new();
                properties.insert("id".to_string(), serde_json::Value::from(id as i64));
                if let Some(area) = serde_json::Number::from_f64(area) {
                    properties.insert("area".to_string(), serde_json::Value::Number(area));
                }
                let rings = rings
                    .iter()
                    .map(|ring| ring.iter().map(|p| p.to_vec()).collect())
                    .collect();
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Polygon(rings))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn ring_area(ring: &[[f64; 2]]) -> f64 {
    ring.windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum::<f64>()
        .abs()
        / 2.0
}

/// Snaps `point` onto `channels`, traces its catchment, crops and
/// polygonizes it.
pub fn delineate(
    fdir: &Array2<u8>,
    channels: &Array2<bool>,
    dirmap: &DirMap,
    transform: &GeoTransform,
    point: (f64, f64),
) -> Result<Catchment> {
    let outlet = snap_to_mask(channels, transform, point)?;
    debug!("pour point ({}, {}) snapped to ({}, {})", point.0, point.1, outlet.0, outlet.1);
    let mask = catchment(fdir, dirmap, transform, outlet)?;
    let window = bounding_window(&mask).ok_or(Error::OutsideExtent { x: outlet.0, y: outlet.1 })?;
    let cropped = window.slice(&mask).to_owned();
    let polygons = polygonize(&cropped, &transform.window(&window));
    Ok(Catchment {
        outlet,
        mask,
        window,
        polygons,
        cell_area: transform.cell_area(),
    })
}
