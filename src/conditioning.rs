//! Hydrological conditioning of a DEM: pit filling, depression filling and
//! flat resolution, in that order.
use std::cmp::Ordering;
use std::cmp::Ordering::Equal;
use std::collections::BinaryHeap;

use ndarray::Array2;
use rayon::prelude::*;

const DX: [isize; 8] = [1, 1, 1, 0, -1, -1, -1, 0];
const DY: [isize; 8] = [-1, 0, 1, 1, 1, 0, -1, -1];

#[derive(PartialEq, Debug)]
struct GridCell {
    row: usize,
    column: usize,
    priority: f64,
}

impl Eq for GridCell {}

impl PartialOrd for GridCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GridCell {
    // reversed so BinaryHeap pops the lowest cell first
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.partial_cmp(&self.priority).unwrap_or(Equal)
    }
}

/// Cells changed by each step of [`condition`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditioningReport {
    pub pits_filled: usize,
    pub depression_cells_raised: usize,
    pub flat_cells_resolved: usize,
}

fn is_valid(z: f64, nodata: f64) -> bool {
    !z.is_nan() && z != nodata
}

fn neighbour(row: usize, col: usize, n: usize, rows: usize, columns: usize) -> Option<(usize, usize)> {
    let rn = row as isize + DY[n];
    let cn = col as isize + DX[n];
    if rn < 0 || cn < 0 || rn >= rows as isize || cn >= columns as isize {
        None
    } else {
        Some((rn as usize, cn as usize))
    }
}

/// Runs [`fill_pits`], [`fill_depressions`] and [`resolve_flats`] on `dem`.
pub fn condition(dem: &mut Array2<f64>, nodata: f64) -> ConditioningReport {
    let pits_filled = fill_pits(dem, nodata);
    let depression_cells_raised = fill_depressions(dem, nodata);
    let flat_cells_resolved = resolve_flats(dem, nodata);
    ConditioningReport {
        pits_filled,
        depression_cells_raised,
        flat_cells_resolved,
    }
}

/// Raises single-cell pits to the elevation of their lowest neighbour.
///
/// A pit is an interior cell whose eight neighbours all hold data and are all
/// strictly higher. Returns the number of pits filled.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use catchment_delineate::fill_pits;
///
/// let mut dem = array![
///     [10.0, 12.0, 10.0],
///     [12.0, 9.0,  12.0],
///     [10.0, 12.0, 11.0],
/// ];
/// assert_eq!(fill_pits(&mut dem, -9999.0), 1);
/// assert_eq!(dem[[1, 1]], 10.0);
/// ```
pub fn fill_pits(dem: &mut Array2<f64>, nodata: f64) -> usize {
    let (rows, columns) = dem.dim();
    if rows < 3 || columns < 3 {
        return 0;
    }

    let pits: Vec<(usize, usize, f64)> = (1..rows - 1)
        .into_par_iter()
        .flat_map(|row| {
            let mut local_pits = Vec::new();
            for col in 1..columns - 1 {
                let z = dem[[row, col]];
                if !is_valid(z, nodata) {
                    continue;
                }
                let mut lowest = f64::INFINITY;
                let mut apit = true;
                for n in 0..8 {
                    let zn = dem[[(row as isize + DY[n]) as usize, (col as isize + DX[n]) as usize]];
                    if !is_valid(zn, nodata) || zn <= z {
                        apit = false;
                        break;
                    }
                    lowest = lowest.min(zn);
                }
                if apit {
                    local_pits.push((row, col, lowest));
                }
            }
            local_pits
        })
        .collect();

    for &(row, col, z) in &pits {
        dem[[row, col]] = z;
    }
    pits.len()
}

/// Fills depressions with the Priority-Flood algorithm.
///
/// Flooding starts from every valid cell on the grid edge or next to no-data
/// and proceeds lowest cell first; a newly reached cell lower than the cell it
/// was reached from is raised to that elevation. Afterwards every valid cell
/// has a non-ascending path out of the grid. Filled depressions are left
/// perfectly flat; see [`resolve_flats`]. Returns the number of cells raised.
pub fn fill_depressions(dem: &mut Array2<f64>, nodata: f64) -> usize {
    let (rows, columns) = dem.dim();
    let mut closed = Array2::<bool>::from_elem((rows, columns), false);
    let mut minheap = BinaryHeap::new();

    for row in 0..rows {
        for col in 0..columns {
            let z = dem[[row, col]];
            if !is_valid(z, nodata) {
                closed[[row, col]] = true;
                continue;
            }
            let on_boundary = (0..8).any(|n| match neighbour(row, col, n, rows, columns) {
                Some((rn, cn)) => !is_valid(dem[[rn, cn]], nodata),
                None => true,
            });
            if on_boundary {
                closed[[row, col]] = true;
                minheap.push(GridCell { row, column: col, priority: z });
            }
        }
    }

    let mut raised = 0;
    while let Some(cell) = minheap.pop() {
        for n in 0..8 {
            let Some((rn, cn)) = neighbour(cell.row, cell.column, n, rows, columns) else {
                continue;
            };
            if closed[[rn, cn]] {
                continue;
            }
            closed[[rn, cn]] = true;
            if dem[[rn, cn]] < cell.priority {
                dem[[rn, cn]] = cell.priority;
                raised += 1;
            }
            minheap.push(GridCell {
                row: rn,
                column: cn,
                priority: dem[[rn, cn]],
            });
        }
    }
    raised
}

/// Gives every drainable flat a gradient so D8 routing can cross it.
///
/// Follows Barnes, Lehman & Mulla (2014): each flat is labelled from its low
/// edges (cells of the same elevation that can already drain), a gradient
/// away from higher terrain and a stronger gradient towards the low edges are
/// combined, and flat cells are raised by a per-flat epsilon times that
/// combined gradient. The epsilon keeps every raised cell below the lowest
/// higher neighbour of its flat. Flats without a low edge are left alone.
/// Returns the number of cells raised.
pub fn resolve_flats(dem: &mut Array2<f64>, nodata: f64) -> usize {
    let (rows, columns) = dem.dim();

    // a cell drains if it has a lower neighbour, or can leave the grid
    let mut drains = Array2::<bool>::from_elem((rows, columns), false);
    for row in 0..rows {
        for col in 0..columns {
            let z = dem[[row, col]];
            if !is_valid(z, nodata) {
                continue;
            }
            drains[[row, col]] = (0..8).any(|n| match neighbour(row, col, n, rows, columns) {
                Some((rn, cn)) => {
                    let zn = dem[[rn, cn]];
                    !is_valid(zn, nodata) || zn < z
                }
                None => true,
            });
        }
    }
    let is_flat = |row: usize, col: usize| is_valid(dem[[row, col]], nodata) && !drains[[row, col]];

    let mut low_edges = Vec::new();
    let mut high_edges = Vec::new();
    for row in 0..rows {
        for col in 0..columns {
            let z = dem[[row, col]];
            if !is_valid(z, nodata) {
                continue;
            }
            let flat = !drains[[row, col]];
            for n in 0..8 {
                let Some((rn, cn)) = neighbour(row, col, n, rows, columns) else {
                    continue;
                };
                let zn = dem[[rn, cn]];
                if !flat && zn == z && is_flat(rn, cn) {
                    low_edges.push((row, col));
                    break;
                }
                if flat && is_valid(zn, nodata) && zn > z {
                    high_edges.push((row, col));
                    break;
                }
            }
        }
    }
    if low_edges.is_empty() {
        return 0;
    }

    // label each flat from its low edges; 0 is unlabelled
    let mut labels = Array2::<usize>::zeros((rows, columns));
    let mut next_label = 1;
    for &(row, col) in &low_edges {
        if labels[[row, col]] != 0 {
            continue;
        }
        let z = dem[[row, col]];
        labels[[row, col]] = next_label;
        let mut stack = vec![(row, col)];
        while let Some((r, c)) = stack.pop() {
            for n in 0..8 {
                if let Some((rn, cn)) = neighbour(r, c, n, rows, columns) {
                    if labels[[rn, cn]] == 0 && dem[[rn, cn]] == z {
                        labels[[rn, cn]] = next_label;
                        stack.push((rn, cn));
                    }
                }
            }
        }
        next_label += 1;
    }
    high_edges.retain(|&(row, col)| labels[[row, col]] != 0);

    let mut flat_mask = Array2::<i64>::zeros((rows, columns));
    let mut flat_height = vec![0i64; next_label];

    // gradient away from higher terrain
    let mut level = high_edges;
    let mut loops = 1;
    while !level.is_empty() {
        let mut next = Vec::new();
        for (row, col) in level {
            if flat_mask[[row, col]] > 0 {
                continue;
            }
            let label = labels[[row, col]];
            flat_mask[[row, col]] = loops;
            flat_height[label] = loops;
            for n in 0..8 {
                if let Some((rn, cn)) = neighbour(row, col, n, rows, columns) {
                    if labels[[rn, cn]] == label && is_flat(rn, cn) {
                        next.push((rn, cn));
                    }
                }
            }
        }
        level = next;
        loops += 1;
    }

    // gradient towards lower terrain, combined with the one above
    flat_mask.mapv_inplace(|v| -v);
    let mut level = low_edges;
    let mut loops = 1;
    while !level.is_empty() {
        let mut next = Vec::new();
        for (row, col) in level {
            if flat_mask[[row, col]] > 0 {
                continue;
            }
            let label = labels[[row, col]];
            if flat_mask[[row, col]] < 0 {
                flat_mask[[row, col]] += flat_height[label] + 2 * loops;
            } else {
                flat_mask[[row, col]] = 2 * loops;
            }
            for n in 0..8 {
                if let Some((rn, cn)) = neighbour(row, col, n, rows, columns) {
                    if labels[[rn, cn]] == label && is_flat(rn, cn) {
                        next.push((rn, cn));
                    }
                }
            }
        }
        level = next;
        loops += 1;
    }

    // per flat: the largest gradient value and the smallest rise to higher ground
    let mut max_mask = vec![0i64; next_label];
    let mut min_rise = vec![f64::INFINITY; next_label];
    for row in 0..rows {
        for col in 0..columns {
            let label = labels[[row, col]];
            if label == 0 || !is_flat(row, col) {
                continue;
            }
            max_mask[label] = max_mask[label].max(flat_mask[[row, col]]);
            let z = dem[[row, col]];
            for n in 0..8 {
                if let Some((rn, cn)) = neighbour(row, col, n, rows, columns) {
                    let zn = dem[[rn, cn]];
                    if is_valid(zn, nodata) && zn > z {
                        min_rise[label] = min_rise[label].min(zn - z);
                    }
                }
            }
        }
    }
    let epsilon: Vec<f64> = max_mask
        .iter()
        .zip(&min_rise)
        .map(|(&top, &rise)| {
            let rise = if rise.is_finite() { rise } else { 1e-3 };
            rise / (2.0 * (top + 1) as f64)
        })
        .collect();

    let mut raised = 0;
    for row in 0..rows {
        for col in 0..columns {
            let label = labels[[row, col]];
            if label == 0 || drains[[row, col]] || flat_mask[[row, col]] <= 0 {
                continue;
            }
            dem[[row, col]] += epsilon[label] * flat_mask[[row, col]] as f64;
            raised += 1;
        }
    }
    raised
}
