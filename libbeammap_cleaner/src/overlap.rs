use bitvec::prelude::*;
use fxhash::FxHashMap;
use ndarray::Array2;
use std::fmt::Display;

use super::feedline::FeedlineValidator;
use super::flags::BeamMapFlag;
use super::occupancy::OccupancyGrid;
use super::resonator::{Cell, ResonatorTable};

/// Counters accumulated over one resolve pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapSummary {
    /// Cells claimed by more than one resonator when the pass started
    pub overlapping_cells: usize,
    /// Resonators moved to an empty neighbouring pixel
    pub resolved: usize,
    /// Resonators flagged as duplicate pixels
    pub unresolved: usize,
}

impl Display for OverlapSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} overlapping pixels, {} resonators moved, {} flagged as duplicates",
            self.overlapping_cells, self.resolved, self.unresolved
        )
    }
}

/// Claimant x candidate distances with masked rows and columns.
///
/// Taken rows and columns are masked rather than removed, so the scan order over the
/// remaining entries is the same as over a matrix which had them deleted.
#[derive(Debug)]
struct DistanceMatrix {
    distances: Array2<f64>,
    rows: BitVec,
    cols: BitVec,
}

impl DistanceMatrix {
    fn new(table: &ResonatorTable, claimants: &[usize], candidates: &[Cell]) -> Self {
        let distances = Array2::from_shape_fn((claimants.len(), candidates.len()), |(i, j)| {
            let (x, y) = table.precise(claimants[i]);
            candidates[j].centered_squared_distance(x, y)
        });
        Self {
            distances,
            rows: bitvec![1; claimants.len()],
            cols: bitvec![1; candidates.len()],
        }
    }

    /// The first minimal entry in row-major order over the unmasked entries
    fn argmin(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for row in self.rows.iter_ones() {
            for col in self.cols.iter_ones() {
                let dist = self.distances[(row, col)];
                match best {
                    Some((_, _, best_dist)) if dist >= best_dist => (),
                    _ => best = Some((row, col, dist)),
                }
            }
        }
        best.map(|(row, col, _)| (row, col))
    }

    fn take(&mut self, row: usize, col: usize) {
        self.rows.set(row, false);
        self.cols.set(col, false);
    }

    fn is_exhausted(&self) -> bool {
        self.cols.not_any()
    }

    fn remaining_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter_ones()
    }
}

/// OverlapResolver moves resonators off of over-occupied pixels.
///
/// Each overlapping pixel is handled independently, in grid scan order. The claimants of a
/// pixel are greedily matched to the empty pixels of its 1-ring which lie on the same
/// feedline, taking the globally closest claimant/pixel pair each time. One claimant always
/// keeps the original pixel. When the ring runs out of empty pixels, the claimant closest to
/// the pixel centre keeps it and the rest are flagged `DuplicatePixel`. Pixels further than
/// one ring away are never considered.
#[derive(Debug, Clone, Copy)]
pub struct OverlapResolver {
    validator: FeedlineValidator,
}

impl OverlapResolver {
    pub fn new(validator: FeedlineValidator) -> Self {
        Self { validator }
    }

    /// Resolve every overlap in the grid, updating the grid, placements and flags in place.
    ///
    /// Expects each placeable resonator to be placed at its floored precise coordinate.
    pub fn resolve(
        &self,
        grid: &mut OccupancyGrid,
        table: &mut ResonatorTable,
    ) -> OverlapSummary {
        let overlaps = grid.overlapping_cells();
        let mut claimants_by_cell = Self::index_claimants(grid, table);
        let mut summary = OverlapSummary {
            overlapping_cells: overlaps.len(),
            ..Default::default()
        };

        for cell in overlaps {
            let claimants: Vec<usize> = claimants_by_cell
                .remove(&cell)
                .unwrap_or_default()
                .into_iter()
                .filter(|idx| table.is_placeable(*idx))
                .collect();
            if claimants.len() < 2 {
                log::warn!(
                    "Pixel {cell} is marked as overlapping but has {} claimants",
                    claimants.len()
                );
                continue;
            }
            self.resolve_cell(cell, &claimants, grid, table, &mut summary);
        }

        summary
    }

    /// Map each occupied cell to the placeable resonators floored onto it, in table order
    fn index_claimants(
        grid: &OccupancyGrid,
        table: &ResonatorTable,
    ) -> FxHashMap<Cell, Vec<usize>> {
        let mut index: FxHashMap<Cell, Vec<usize>> = FxHashMap::default();
        for idx in 0..table.len() {
            if !table.is_placeable(idx) {
                continue;
            }
            if let Some(cell) = table.floored(idx) {
                if grid.count(cell) > 1 {
                    index.entry(cell).or_default().push(idx);
                }
            }
        }
        index
    }

    fn resolve_cell(
        &self,
        cell: Cell,
        claimants: &[usize],
        grid: &mut OccupancyGrid,
        table: &mut ResonatorTable,
        summary: &mut OverlapSummary,
    ) {
        // Any claimant will do as the feedline reference; they share the pixel
        let reference_id = table.res_id(claimants[0]);
        let candidates: Vec<Cell> = grid
            .empty_neighbors(cell)
            .into_iter()
            .filter(|neighbor| self.validator.classify_cell(reference_id, *neighbor))
            .collect();

        if candidates.is_empty() {
            log::debug!(
                "No empty neighbours for pixel {cell} with {} claimants",
                claimants.len()
            );
            Self::keep_nearest(cell, claimants, grid, table, summary);
            return;
        }

        let mut matrix = DistanceMatrix::new(table, claimants, &candidates);
        for _ in 0..(claimants.len() - 1) {
            let Some((row, col)) = matrix.argmin() else {
                break;
            };
            let to_move = claimants[row];
            let target = candidates[col];
            table.set_placed(to_move, Some(target));
            grid.set(target, 1);
            grid.decrement(cell);
            matrix.take(row, col);
            summary.resolved += 1;
            log::debug!(
                "Moved resonator {} from {cell} to {target}",
                table.res_id(to_move)
            );

            if matrix.is_exhausted() {
                let remaining: Vec<usize> =
                    matrix.remaining_rows().map(|r| claimants[r]).collect();
                Self::keep_nearest(cell, &remaining, grid, table, summary);
                break;
            }
        }
    }

    /// The claimant closest to the pixel centre keeps the pixel; everyone else is a duplicate
    fn keep_nearest(
        cell: Cell,
        claimants: &[usize],
        grid: &mut OccupancyGrid,
        table: &mut ResonatorTable,
        summary: &mut OverlapSummary,
    ) {
        let mut nearest: Option<(usize, f64)> = None;
        for idx in claimants.iter() {
            let (x, y) = table.precise(*idx);
            let dist = cell.centered_squared_distance(x, y);
            match nearest {
                Some((_, best_dist)) if dist >= best_dist => (),
                _ => nearest = Some((*idx, dist)),
            }
        }
        let Some((keeper, _)) = nearest else {
            return;
        };

        grid.set(cell, 1);
        table.set_placed(keeper, Some(cell));
        for idx in claimants.iter().filter(|idx| **idx != keeper) {
            table.set_flag(*idx, BeamMapFlag::DuplicatePixel);
            table.set_placed(*idx, None);
            summary.unresolved += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Instrument;

    fn place_floored(table: &mut ResonatorTable) {
        for idx in 0..table.len() {
            let cell = table.floored(idx);
            table.set_placed(idx, cell);
        }
    }

    /// A 10x10 DARKNESS array (everything is feedline 0) where only (4, 5) and (5, 4) are
    /// empty around (5, 5)
    fn crowded_table() -> ResonatorTable {
        let mut table = ResonatorTable::new();
        let occupied = [(4, 4), (4, 6), (5, 6), (6, 4), (6, 5), (6, 6)];
        for (i, (x, y)) in occupied.iter().enumerate() {
            table.push(
                10100 + i as u32,
                BeamMapFlag::Good,
                *x as f64 + 0.5,
                *y as f64 + 0.5,
            );
        }
        table
    }

    fn resolver() -> OverlapResolver {
        OverlapResolver::new(FeedlineValidator::new(Instrument::Darkness, 0, false))
    }

    #[test]
    fn test_three_claimants_two_neighbors() {
        let mut table = crowded_table();
        table.push(10000, BeamMapFlag::Good, 5.1, 5.2);
        table.push(10001, BeamMapFlag::Good, 5.3, 5.9);
        table.push(10002, BeamMapFlag::Double, 5.9, 5.5);
        place_floored(&mut table);
        let mut grid = OccupancyGrid::build(&table, 10, 10);
        assert_eq!(grid.count(Cell::new(5, 5)), 3);

        let summary = resolver().resolve(&mut grid, &mut table);
        assert_eq!(summary.overlapping_cells, 1);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.unresolved, 0);
        assert_eq!(table.placed(6), Some(Cell::new(4, 5)));
        assert_eq!(table.placed(7), Some(Cell::new(5, 5)));
        assert_eq!(table.placed(8), Some(Cell::new(5, 4)));
        assert_eq!(grid.count(Cell::new(5, 5)), 1);
        assert_eq!(grid.count(Cell::new(4, 5)), 1);
        assert_eq!(grid.count(Cell::new(5, 4)), 1);
        assert!(grid.overlapping_cells().is_empty());
    }

    #[test]
    fn test_extra_claimant_becomes_duplicate() {
        let mut table = crowded_table();
        table.push(10000, BeamMapFlag::Good, 5.1, 5.2);
        table.push(10001, BeamMapFlag::Good, 5.3, 5.9);
        table.push(10002, BeamMapFlag::Good, 5.9, 5.5);
        table.push(10003, BeamMapFlag::Good, 5.5, 5.5);
        place_floored(&mut table);
        let mut grid = OccupancyGrid::build(&table, 10, 10);

        let summary = resolver().resolve(&mut grid, &mut table);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.unresolved, 1);
        // Closest pairs go first: (5.1, 5.2) -> (4, 5), then the centred one ties on both
        // columns and takes the only one left
        assert_eq!(table.placed(6), Some(Cell::new(4, 5)));
        assert_eq!(table.placed(9), Some(Cell::new(5, 4)));
        // Of the two left over, (5.9, 5.5) is closer to the centre of (5, 5)
        assert_eq!(table.placed(8), Some(Cell::new(5, 5)));
        assert_eq!(table.flag(7), BeamMapFlag::DuplicatePixel);
        assert_eq!(table.placed(7), None);
        assert_eq!(grid.count(Cell::new(5, 5)), 1);
    }

    #[test]
    fn test_no_neighbors_keeps_nearest() {
        let mut table = ResonatorTable::new();
        for x in 0..3 {
            for y in 0..3 {
                if (x, y) != (1, 1) {
                    table.push(10500 + x * 3 + y, BeamMapFlag::Good, x as f64, y as f64);
                }
            }
        }
        table.push(10000, BeamMapFlag::Good, 1.9, 1.9);
        table.push(10001, BeamMapFlag::Good, 1.4, 1.6);
        table.push(10002, BeamMapFlag::Double, 1.0, 1.0);
        place_floored(&mut table);
        let mut grid = OccupancyGrid::build(&table, 3, 3);

        let summary = resolver().resolve(&mut grid, &mut table);
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.unresolved, 2);
        assert_eq!(table.placed(9), Some(Cell::new(1, 1)));
        assert_eq!(table.flag(8), BeamMapFlag::DuplicatePixel);
        assert_eq!(table.flag(10), BeamMapFlag::DuplicatePixel);
        assert_eq!(table.placed(8), None);
        assert_eq!(table.placed(10), None);
        assert_eq!(grid.count(Cell::new(1, 1)), 1);
    }

    #[test]
    fn test_neighbors_on_other_feedline_rejected() {
        // MEC feedline 0 covers x in [0, 14); the pixel (13, 5) borders feedline 1
        let resolver = OverlapResolver::new(FeedlineValidator::new(Instrument::Mec, 0, false));
        let mut table = ResonatorTable::new();
        for (i, (x, y)) in [(12, 4), (12, 5), (12, 6), (13, 4)].iter().enumerate() {
            table.push(10100 + i as u32, BeamMapFlag::Good, *x as f64, *y as f64);
        }
        table.push(10000, BeamMapFlag::Good, 13.9, 5.5);
        table.push(10001, BeamMapFlag::Good, 13.2, 5.8);
        place_floored(&mut table);
        let mut grid = OccupancyGrid::build(&table, 20, 30);

        let summary = resolver.resolve(&mut grid, &mut table);
        assert_eq!(summary.resolved, 1);
        assert_eq!(table.placed(5), Some(Cell::new(13, 6)));
        assert_eq!(table.placed(4), Some(Cell::new(13, 5)));
        assert_eq!(grid.count(Cell::new(14, 5)), 0);
        assert_eq!(grid.count(Cell::new(14, 6)), 0);
    }

    #[test]
    fn test_argmin_prefers_first_in_scan_order() {
        let mut table = ResonatorTable::new();
        table.push(10000, BeamMapFlag::Good, 1.5, 1.5);
        table.push(10001, BeamMapFlag::Good, 1.5, 1.5);
        let candidates = [Cell::new(0, 1), Cell::new(1, 0)];
        let mut matrix = DistanceMatrix::new(&table, &[0, 1], &candidates);
        assert_eq!(matrix.argmin(), Some((0, 0)));
        matrix.take(0, 0);
        assert_eq!(matrix.argmin(), Some((1, 1)));
        matrix.take(1, 1);
        assert!(matrix.is_exhausted());
        assert_eq!(matrix.argmin(), None);
    }
}
