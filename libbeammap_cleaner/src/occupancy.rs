use ndarray::Array2;

use super::resonator::{Cell, ResonatorTable};

/// Per-pixel resonator counts over the quantized array.
///
/// The counts are stored as an `[x, y]` indexed matrix of shape (n_cols, n_rows), so the
/// natural scan order of the grid is x-major. Only placeable (good/double) resonators
/// contribute.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyGrid {
    counts: Array2<u32>,
}

impl OccupancyGrid {
    /// An empty grid
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            counts: Array2::zeros((n_cols, n_rows)),
        }
    }

    /// Count every placeable resonator at its floored precise coordinate.
    ///
    /// Coordinates outside of the array are not counted.
    pub fn build(table: &ResonatorTable, n_rows: usize, n_cols: usize) -> Self {
        let mut grid = Self::new(n_rows, n_cols);
        for idx in 0..table.len() {
            if !table.is_placeable(idx) {
                continue;
            }
            if let Some(cell) = table.floored(idx) {
                if grid.contains(cell) {
                    grid.increment(cell);
                }
            }
        }
        grid
    }

    pub fn n_rows(&self) -> usize {
        self.counts.ncols()
    }

    pub fn n_cols(&self) -> usize {
        self.counts.nrows()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.n_cols() && cell.y < self.n_rows()
    }

    /// Resonators counted at a cell. Cells outside of the array hold nothing
    pub fn count(&self, cell: Cell) -> u32 {
        self.counts.get((cell.x, cell.y)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.sum()
    }

    pub(crate) fn increment(&mut self, cell: Cell) {
        self.counts[(cell.x, cell.y)] += 1;
    }

    pub(crate) fn decrement(&mut self, cell: Cell) {
        let count = &mut self.counts[(cell.x, cell.y)];
        *count = count.saturating_sub(1);
    }

    pub(crate) fn set(&mut self, cell: Cell, value: u32) {
        self.counts[(cell.x, cell.y)] = value;
    }

    /// Cells claimed by more than one resonator, in grid scan order
    pub fn overlapping_cells(&self) -> Vec<Cell> {
        self.cells_where(|count| count > 1)
    }

    /// Unoccupied cells, in grid scan order
    pub fn empty_cells(&self) -> Vec<Cell> {
        self.cells_where(|count| count == 0)
    }

    /// The unoccupied cells of the 1-ring around `cell`, in grid scan order.
    ///
    /// The ring is clipped at the array edge and never includes `cell` itself.
    pub fn empty_neighbors(&self, cell: Cell) -> Vec<Cell> {
        let mut neighbors = Vec::with_capacity(8);
        for dx in -1_i64..=1 {
            for dy in -1_i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = cell.x as i64 + dx;
                let ny = cell.y as i64 + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                let neighbor = Cell::new(nx as usize, ny as usize);
                if self.contains(neighbor) && self.count(neighbor) == 0 {
                    neighbors.push(neighbor);
                }
            }
        }
        neighbors
    }

    fn cells_where<F: Fn(u32) -> bool>(&self, predicate: F) -> Vec<Cell> {
        self.counts
            .indexed_iter()
            .filter(|(_, count)| predicate(**count))
            .map(|((x, y), _)| Cell::new(x, y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::BeamMapFlag;

    #[test]
    fn test_build_counts_placeable_only() {
        let mut table = ResonatorTable::new();
        table.push(10000, BeamMapFlag::Good, 2.3, 1.7);
        table.push(10001, BeamMapFlag::Double, 2.9, 1.1);
        table.push(10002, BeamMapFlag::Failed, 2.5, 1.5);
        table.push(10003, BeamMapFlag::WrongFeedline, f64::NAN, f64::NAN);
        table.push(10004, BeamMapFlag::Good, 0.0, 0.0);
        let grid = OccupancyGrid::build(&table, 4, 5);
        assert_eq!(grid.n_rows(), 4);
        assert_eq!(grid.n_cols(), 5);
        assert_eq!(grid.count(Cell::new(2, 1)), 2);
        assert_eq!(grid.count(Cell::new(0, 0)), 1);
        assert_eq!(grid.total(), 3);
        assert_eq!(grid.overlapping_cells(), vec![Cell::new(2, 1)]);
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut table = ResonatorTable::new();
        table.push(10000, BeamMapFlag::Good, 5.0, 1.0);
        table.push(10001, BeamMapFlag::Good, 1.0, 4.2);
        table.push(10002, BeamMapFlag::Good, -0.5, 1.0);
        let grid = OccupancyGrid::build(&table, 4, 5);
        assert_eq!(grid.total(), 0);
        assert_eq!(grid.count(Cell::new(7, 7)), 0);
    }

    #[test]
    fn test_scan_order_is_x_major() {
        let mut grid = OccupancyGrid::new(3, 3);
        grid.set(Cell::new(1, 0), 2);
        grid.set(Cell::new(0, 2), 3);
        assert_eq!(
            grid.overlapping_cells(),
            vec![Cell::new(0, 2), Cell::new(1, 0)]
        );
    }

    #[test]
    fn test_empty_neighbors() {
        let mut grid = OccupancyGrid::new(3, 3);
        grid.set(Cell::new(1, 1), 2);
        grid.set(Cell::new(0, 1), 1);
        grid.set(Cell::new(2, 2), 1);
        let neighbors = grid.empty_neighbors(Cell::new(1, 1));
        assert_eq!(
            neighbors,
            vec![
                Cell::new(0, 0),
                Cell::new(0, 2),
                Cell::new(1, 0),
                Cell::new(1, 2),
                Cell::new(2, 0),
                Cell::new(2, 1),
            ]
        );
        // Clipped at the corner
        let corner = grid.empty_neighbors(Cell::new(0, 0));
        assert_eq!(corner, vec![Cell::new(1, 0)]);
    }

    #[test]
    fn test_increment_decrement() {
        let mut grid = OccupancyGrid::new(2, 2);
        let cell = Cell::new(1, 1);
        grid.increment(cell);
        grid.increment(cell);
        grid.decrement(cell);
        assert_eq!(grid.count(cell), 1);
        grid.decrement(cell);
        grid.decrement(cell);
        assert_eq!(grid.count(cell), 0);
        assert_eq!(grid.empty_cells().len(), 4);
    }
}
