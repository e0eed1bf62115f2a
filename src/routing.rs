//! D8 flow direction and flow accumulation.
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Row/column step of each direction, in [`DirMap`] order: N, NE, E, SE, S, SW, W, NW.
const OFFSETS: [(isize, isize); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// Codes written into a flow-direction grid for N, NE, E, SE, S, SW, W, NW.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirMap(pub [u8; 8]);

/// The ESRI direction codes.
pub const DIRMAP: DirMap = DirMap([64, 128, 1, 2, 4, 8, 16, 32]);

/// Flow-direction value of cells with no outflow and of no-data cells.
pub const NO_FLOW: u8 = 0;

impl DirMap {
    /// `(drow, dcol)` step for a direction code, `None` for [`NO_FLOW`] or an
    /// unknown code.
    pub fn offset(&self, code: u8) -> Option<(isize, isize)> {
        if code == NO_FLOW {
            return None;
        }
        self.0.iter().position(|&c| c == code).map(|i| OFFSETS[i])
    }
}

/// The cell `(row, col)` drains into, if it drains into a cell of the grid.
pub fn downstream(fdir: &Array2<u8>, dirmap: &DirMap, row: usize, col: usize) -> Option<(usize, usize)> {
    let (dr, dc) = dirmap.offset(fdir[[row, col]])?;
    let rn = row as isize + dr;
    let cn = col as isize + dc;
    if rn < 0 || cn < 0 || rn >= fdir.nrows() as isize || cn >= fdir.ncols() as isize {
        return None;
    }
    Some((rn as usize, cn as usize))
}

/// D8 flow directions: each cell points at the neighbour with the steepest
/// drop (elevation difference over distance).
///
/// Ties go to the first direction in `dirmap` order. Cells without a lower
/// neighbour, and no-data cells, get [`NO_FLOW`].
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use catchment_delineate::{flowdir, DIRMAP};
///
/// let dem = array![
///     [3.0, 3.0, 3.0],
///     [3.0, 2.0, 1.0],
///     [3.0, 3.0, 3.0],
/// ];
/// let fdir = flowdir(&dem, -9999.0, 1.0, 1.0, &DIRMAP);
/// assert_eq!(fdir[[1, 1]], 1); // east
/// ```
pub fn flowdir(dem: &Array2<f64>, nodata: f64, resx: f64, resy: f64, dirmap: &DirMap) -> Array2<u8> {
    let (rows, columns) = dem.dim();
    let diag = (resx * resx + resy * resy).sqrt();
    let distance: [f64; 8] = [resy, diag, resx, diag, resy, diag, resx, diag];
    let valid = |z: f64| !z.is_nan() && z != nodata;

    let mut fdir = Array2::<u8>::from_elem((rows, columns), NO_FLOW);
    fdir.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut codes)| {
            for col in 0..columns {
                let z = dem[[row, col]];
                if !valid(z) {
                    continue;
                }
                let mut max_drop = 0.0;
                for (n, &(dr, dc)) in OFFSETS.iter().enumerate() {
                    let rn = row as isize + dr;
                    let cn = col as isize + dc;
                    if rn < 0 || cn < 0 || rn >= rows as isize || cn >= columns as isize {
                        continue;
                    }
                    let zn = dem[[rn as usize, cn as usize]];
                    if !valid(zn) {
                        continue;
                    }
                    let drop = (z - zn) / distance[n];
                    if drop > max_drop {
                        max_drop = drop;
                        codes[col] = dirmap.0[n];
                    }
                }
            }
        });
    fdir
}

/// Number of cells draining through each cell, the cell itself included.
///
/// Cells where `valid` is false contribute nothing and accumulate 0.
pub fn accumulation(fdir: &Array2<u8>, dirmap: &DirMap, valid: &Array2<bool>) -> Array2<f64> {
    let (rows, columns) = fdir.dim();
    let mut in_degree = Array2::<u32>::zeros((rows, columns));
    for row in 0..rows {
        for col in 0..columns {
            if let Some((rn, cn)) = downstream(fdir, dirmap, row, col) {
                in_degree[[rn, cn]] += 1;
            }
        }
    }

    let mut acc = valid.mapv(|v| if v { 1.0 } else { 0.0 });
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for row in 0..rows {
        for col in 0..columns {
            if in_degree[[row, col]] == 0 {
                stack.push((row, col));
            }
        }
    }

    while let Some((row, col)) = stack.pop() {
        let Some((rn, cn)) = downstream(fdir, dirmap, row, col) else {
            continue;
        };
        acc[[rn, cn]] += acc[[row, col]];
        in_degree[[rn, cn]] -= 1;
        if in_degree[[rn, cn]] == 0 {
            stack.push((rn, cn));
        }
    }
    acc
}
