use std::fmt::Display;

use super::constants::PIXEL_CENTER_OFFSET;
use super::flags::BeamMapFlag;

/// A single pixel of the quantized array, addressed as (x, y) = (column, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Floor a precise coordinate onto its cell.
    ///
    /// Returns None for non-finite or negative coordinates, which have no cell.
    pub fn from_precise(x: f64, y: f64) -> Option<Self> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (fx, fy) = (x.floor(), y.floor());
        if fx < 0.0 || fy < 0.0 {
            return None;
        }
        Some(Self::new(fx as usize, fy as usize))
    }

    /// Squared distance between this cell and a precise coordinate shifted onto the
    /// pixel-centre convention
    pub fn centered_squared_distance(&self, x: f64, y: f64) -> f64 {
        let dx = x - PIXEL_CENTER_OFFSET - self.x as f64;
        let dy = y - PIXEL_CENTER_OFFSET - self.y as f64;
        dx * dx + dy * dy
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Number of resonators carrying each flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagCounts {
    counts: [usize; 8],
}

impl FlagCounts {
    pub fn get(&self, flag: BeamMapFlag) -> usize {
        self.counts[flag.code() as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

impl Display for FlagCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = BeamMapFlag::ALL
            .iter()
            .filter(|flag| self.get(**flag) > 0)
            .map(|flag| format!("{flag}: {}", self.get(*flag)))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// How far placed resonators ended up from their measured positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplacementStats {
    pub count: usize,
    pub mean: f64,
    pub max: f64,
}

/// The beammap as a struct of arrays, one entry per resonator.
///
/// Records are never created or destroyed by cleaning; the pipeline stages only change
/// flags, invalidate precise coordinates and assign pixels. The resID is immutable.
#[derive(Debug, Clone, Default)]
pub struct ResonatorTable {
    res_ids: Vec<u32>,
    flags: Vec<BeamMapFlag>,
    precise_x: Vec<f64>,
    precise_y: Vec<f64>,
    placed: Vec<Option<Cell>>,
}

impl ResonatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resonator measured at a precise coordinate. It starts out unplaced
    pub fn push(&mut self, res_id: u32, flag: BeamMapFlag, x: f64, y: f64) {
        self.res_ids.push(res_id);
        self.flags.push(flag);
        self.precise_x.push(x);
        self.precise_y.push(y);
        self.placed.push(None);
    }

    pub fn len(&self) -> usize {
        self.res_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.res_ids.is_empty()
    }

    pub fn res_id(&self, idx: usize) -> u32 {
        self.res_ids[idx]
    }

    pub fn res_ids(&self) -> &[u32] {
        &self.res_ids
    }

    pub fn flags(&self) -> &[BeamMapFlag] {
        &self.flags
    }

    pub fn placements(&self) -> &[Option<Cell>] {
        &self.placed
    }

    pub fn flag(&self, idx: usize) -> BeamMapFlag {
        self.flags[idx]
    }

    pub fn precise(&self, idx: usize) -> (f64, f64) {
        (self.precise_x[idx], self.precise_y[idx])
    }

    pub fn placed(&self, idx: usize) -> Option<Cell> {
        self.placed[idx]
    }

    pub fn is_placeable(&self, idx: usize) -> bool {
        self.flags[idx].is_placeable()
    }

    /// The floored precise coordinate of a resonator, if it has one
    pub fn floored(&self, idx: usize) -> Option<Cell> {
        Cell::from_precise(self.precise_x[idx], self.precise_y[idx])
    }

    pub(crate) fn set_flag(&mut self, idx: usize, flag: BeamMapFlag) {
        self.flags[idx] = flag;
    }

    pub(crate) fn set_placed(&mut self, idx: usize, cell: Option<Cell>) {
        self.placed[idx] = cell;
    }

    pub(crate) fn invalidate_precise(&mut self, idx: usize) {
        self.precise_x[idx] = f64::NAN;
        self.precise_y[idx] = f64::NAN;
    }

    pub fn flag_counts(&self) -> FlagCounts {
        let mut counts = FlagCounts::default();
        for flag in self.flags.iter() {
            counts.counts[flag.code() as usize] += 1;
        }
        counts
    }

    /// Distance from each placed good/double resonator's pixel to its centre-aligned
    /// precise coordinate. None if nothing is placed.
    pub fn displacement_stats(&self) -> Option<DisplacementStats> {
        let mut count = 0;
        let mut sum = 0.0;
        let mut max: f64 = 0.0;
        for idx in 0..self.len() {
            if !self.is_placeable(idx) {
                continue;
            }
            let Some(cell) = self.placed[idx] else {
                continue;
            };
            let (x, y) = self.precise(idx);
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            let dist = cell.centered_squared_distance(x, y).sqrt();
            count += 1;
            sum += dist;
            max = max.max(dist);
        }
        if count == 0 {
            None
        } else {
            Some(DisplacementStats {
                count,
                mean: sum / count as f64,
                max,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_from_precise() {
        assert_eq!(Cell::from_precise(5.9, 0.0), Some(Cell::new(5, 0)));
        assert_eq!(Cell::from_precise(-0.2, 3.0), None);
        assert_eq!(Cell::from_precise(f64::NAN, 3.0), None);
        assert_eq!(Cell::from_precise(2.0, f64::INFINITY), None);
    }

    #[test]
    fn test_centered_distance() {
        let cell = Cell::new(5, 5);
        assert_eq!(cell.centered_squared_distance(5.5, 5.5), 0.0);
        assert!((cell.centered_squared_distance(6.5, 5.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flag_counts() {
        let mut table = ResonatorTable::new();
        table.push(10000, BeamMapFlag::Good, 1.0, 1.0);
        table.push(10001, BeamMapFlag::Good, 2.0, 1.0);
        table.push(10002, BeamMapFlag::Failed, f64::NAN, f64::NAN);
        let counts = table.flag_counts();
        assert_eq!(counts.get(BeamMapFlag::Good), 2);
        assert_eq!(counts.get(BeamMapFlag::Failed), 1);
        assert_eq!(counts.get(BeamMapFlag::Double), 0);
        assert_eq!(counts.total(), table.len());
        assert_eq!(format!("{counts}"), "good: 2, failed: 1");
    }

    #[test]
    fn test_displacement_stats() {
        let mut table = ResonatorTable::new();
        assert!(table.displacement_stats().is_none());
        table.push(10000, BeamMapFlag::Good, 1.5, 1.5);
        table.push(10001, BeamMapFlag::Double, 2.5, 1.5);
        table.push(10002, BeamMapFlag::Failed, 0.5, 0.5);
        table.set_placed(0, Some(Cell::new(1, 1)));
        table.set_placed(1, Some(Cell::new(3, 1)));
        table.set_placed(2, Some(Cell::new(9, 9)));
        let stats = table.displacement_stats().unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 0.5).abs() < 1e-12);
        assert!((stats.max - 1.0).abs() < 1e-12);
    }
}
