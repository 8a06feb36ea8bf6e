use bit_set::BitSet;
use fxhash::FxHashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt::Display;

use super::config::Config;
use super::error::{CleanerError, InvariantError};
use super::feedline::FeedlineValidator;
use super::flags::BeamMapFlag;
use super::occupancy::OccupancyGrid;
use super::overlap::{OverlapResolver, OverlapSummary};
use super::resonator::{Cell, ResonatorTable};

/// The stages of a cleaning pass. Each operation of the BeammapCleaner moves it forward
/// exactly one stage; there is no going back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CleanerStage {
    Loaded,
    FeedlinesValidated,
    GridBuilt,
    OverlapsResolved,
    FailedPixelsPlaced,
    Finalized,
}

impl Display for CleanerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Loaded => "Loaded",
            Self::FeedlinesValidated => "FeedlinesValidated",
            Self::GridBuilt => "GridBuilt",
            Self::OverlapsResolved => "OverlapsResolved",
            Self::FailedPixelsPlaced => "FailedPixelsPlaced",
            Self::Finalized => "Finalized",
        };
        write!(f, "{name}")
    }
}

/// Outcome of placing resonators which ended up without a pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailedPlacementSummary {
    pub placed: usize,
    pub unplaceable: usize,
}

/// BeammapCleaner owns a beammap for one cleaning pass.
///
/// The pass runs validate_feedlines -> build_grid -> resolve_overlaps -> finalize.
/// place_failed_pixels may be run between resolve_overlaps and finalize, but is not part of
/// the default pipeline. Calling an operation out of order is an error and leaves the
/// cleaner untouched.
#[derive(Debug)]
pub struct BeammapCleaner {
    n_rows: usize,
    n_cols: usize,
    validator: FeedlineValidator,
    table: ResonatorTable,
    grid: Option<OccupancyGrid>,
    randomly_placed: BitSet,
    stage: CleanerStage,
}

impl BeammapCleaner {
    /// Create a cleaner for the array described by the Config
    pub fn new(table: ResonatorTable, config: &Config) -> Self {
        Self::with_validator(
            table,
            config.num_rows,
            config.num_cols,
            FeedlineValidator::from_config(config),
        )
    }

    pub fn with_validator(
        table: ResonatorTable,
        n_rows: usize,
        n_cols: usize,
        validator: FeedlineValidator,
    ) -> Self {
        Self {
            n_rows,
            n_cols,
            validator,
            table,
            grid: None,
            randomly_placed: BitSet::new(),
            stage: CleanerStage::Loaded,
        }
    }

    pub fn stage(&self) -> CleanerStage {
        self.stage
    }

    pub fn table(&self) -> &ResonatorTable {
        &self.table
    }

    pub fn grid(&self) -> Option<&OccupancyGrid> {
        self.grid.as_ref()
    }

    pub fn into_table(self) -> ResonatorTable {
        self.table
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: &[CleanerStage],
    ) -> Result<(), CleanerError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(CleanerError::OutOfOrder {
                operation,
                stage: self.stage,
            })
        }
    }

    /// Flag placeable resonators which are measured outside of their own feedline as
    /// `WrongFeedline` and drop their coordinates.
    ///
    /// Returns the number of resonators flagged by this call.
    pub fn validate_feedlines(&mut self) -> Result<usize, CleanerError> {
        self.require("validate feedlines", &[CleanerStage::Loaded])?;

        let mut n_flagged = 0;
        for idx in 0..self.table.len() {
            if !self.table.is_placeable(idx) {
                continue;
            }
            let (x, y) = self.table.precise(idx);
            if !self.validator.classify(self.table.res_id(idx), x, y) {
                self.table.set_flag(idx, BeamMapFlag::WrongFeedline);
                self.table.invalidate_precise(idx);
                self.table.set_placed(idx, None);
                n_flagged += 1;
            }
        }
        log::info!(
            "{} pixels in wrong feedline ({} newly flagged). Flagged as bad",
            self.table.flag_counts().get(BeamMapFlag::WrongFeedline),
            n_flagged
        );

        self.stage = CleanerStage::FeedlinesValidated;
        Ok(n_flagged)
    }

    /// Lock in the floored coordinates and count the occupancy of every pixel
    pub fn build_grid(&mut self) -> Result<(), CleanerError> {
        self.require("build the grid", &[CleanerStage::FeedlinesValidated])?;

        let grid = OccupancyGrid::build(&self.table, self.n_rows, self.n_cols);
        for idx in 0..self.table.len() {
            let cell = self.table.floored(idx).filter(|cell| grid.contains(*cell));
            self.table.set_placed(idx, cell);
        }
        log::info!(
            "Built {}x{} occupancy grid with {} resonators, {} overlapping pixels",
            self.n_cols,
            self.n_rows,
            grid.total(),
            grid.overlapping_cells().len()
        );

        self.grid = Some(grid);
        self.stage = CleanerStage::GridBuilt;
        Ok(())
    }

    /// Move resonators off of shared pixels; see OverlapResolver
    pub fn resolve_overlaps(&mut self) -> Result<OverlapSummary, CleanerError> {
        self.require("resolve overlaps", &[CleanerStage::GridBuilt])?;
        let Some(grid) = self.grid.as_mut() else {
            return Err(CleanerError::OutOfOrder {
                operation: "resolve overlaps",
                stage: self.stage,
            });
        };

        let summary = OverlapResolver::new(self.validator).resolve(grid, &mut self.table);
        log::info!("Successfully resolved {} overlaps", summary.resolved);
        log::info!("Failed to resolve {} overlaps", summary.unresolved);

        self.stage = CleanerStage::OverlapsResolved;
        Ok(summary)
    }

    /// Give every unplaced resonator a random empty pixel on its own feedline.
    ///
    /// Only pixels which are empty on the grid and not held by any other record are handed
    /// out. Resonators rejected by the cleaner (wrong feedline, duplicate pixel) are left alone,
    /// as are resonators whose resID does not name a feedline of the instrument. Flags are
    /// not changed. The same seed always produces the same placement.
    pub fn place_failed_pixels(
        &mut self,
        seed: u64,
    ) -> Result<FailedPlacementSummary, CleanerError> {
        self.require("place failed pixels", &[CleanerStage::OverlapsResolved])?;
        let Some(grid) = self.grid.as_mut() else {
            return Err(CleanerError::OutOfOrder {
                operation: "place failed pixels",
                stage: self.stage,
            });
        };

        let n_feedlines = self.validator.instrument().n_feedlines() as i64;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut summary = FailedPlacementSummary::default();
        let mut by_feedline: Vec<Vec<usize>> = vec![Vec::new(); n_feedlines as usize];
        for idx in 0..self.table.len() {
            if self.table.placed(idx).is_some() || self.table.flag(idx).is_rejected() {
                continue;
            }
            let feedline = self.validator.expected_feedline(self.table.res_id(idx));
            if (0..n_feedlines).contains(&feedline) {
                by_feedline[feedline as usize].push(idx);
            } else {
                summary.unplaceable += 1;
            }
        }

        // Pixels held by any record, counted on the grid or not
        let mut held = BitSet::with_capacity(self.n_rows * self.n_cols);
        for cell in self.table.placements().iter().flatten() {
            held.insert(cell.x * self.n_rows + cell.y);
        }

        for to_place in by_feedline.iter().filter(|members| !members.is_empty()) {
            let reference_id = self.table.res_id(to_place[0]);
            let candidates: Vec<Cell> = grid
                .empty_cells()
                .into_iter()
                .filter(|cell| !held.contains(cell.x * self.n_rows + cell.y))
                .filter(|cell| self.validator.classify_cell(reference_id, *cell))
                .collect();
            let chosen: Vec<Cell> = candidates
                .choose_multiple(&mut rng, to_place.len())
                .copied()
                .collect();
            for (idx, cell) in to_place.iter().zip(chosen.iter()) {
                self.table.set_placed(*idx, Some(*cell));
                grid.increment(*cell);
                held.insert(cell.x * self.n_rows + cell.y);
                self.randomly_placed.insert(*idx);
                summary.placed += 1;
            }
            summary.unplaceable += to_place.len() - chosen.len();
        }

        if summary.unplaceable > 0 {
            log::warn!(
                "{} resonators could not be given a pixel on their feedline",
                summary.unplaceable
            );
        }
        log::info!("Randomly placed {} failed pixels", summary.placed);

        self.stage = CleanerStage::FailedPixelsPlaced;
        Ok(summary)
    }

    /// Close the pass and report the final state of the beammap
    pub fn finalize(&mut self) -> Result<(), CleanerError> {
        self.require(
            "finalize",
            &[CleanerStage::OverlapsResolved, CleanerStage::FailedPixelsPlaced],
        )?;

        log::info!("Final flags -- {}", self.table.flag_counts());
        if let Some(stats) = self.table.displacement_stats() {
            log::info!(
                "{} placed pixels moved {:.3} px on average, {:.3} px at most",
                stats.count,
                stats.mean,
                stats.max
            );
        }

        self.stage = CleanerStage::Finalized;
        Ok(())
    }

    /// Run the default pipeline from a freshly loaded beammap
    pub fn run(&mut self) -> Result<OverlapSummary, CleanerError> {
        self.validate_feedlines()?;
        self.build_grid()?;
        let summary = self.resolve_overlaps()?;
        self.finalize()?;
        Ok(summary)
    }

    /// Check the beammap invariants for the current stage.
    ///
    /// Placements always lie inside the array, rejected resonators are never placed, and the
    /// grid counts agree with the placements. Once overlaps are resolved, no two placed
    /// good/double resonators share a pixel, and a randomly placed resonator shares its pixel
    /// with no other record at all.
    pub fn verify(&self) -> Result<(), InvariantError> {
        let mut occupied = BitSet::with_capacity(self.n_rows * self.n_cols);
        let mut expected = self
            .grid
            .as_ref()
            .map(|_| OccupancyGrid::new(self.n_rows, self.n_cols));
        let check_unique = self.stage >= CleanerStage::OverlapsResolved;

        for idx in 0..self.table.len() {
            let Some(cell) = self.table.placed(idx) else {
                continue;
            };
            let res_id = self.table.res_id(idx);
            let flag = self.table.flag(idx);
            if flag.is_rejected() {
                return Err(InvariantError::RejectedButPlaced { res_id, flag });
            }
            if cell.x >= self.n_cols || cell.y >= self.n_rows {
                return Err(InvariantError::OutOfBounds { res_id, cell });
            }
            if !flag.is_placeable() && !self.randomly_placed.contains(idx) {
                continue;
            }
            if let Some(expected) = expected.as_mut() {
                expected.increment(cell);
            }
            if check_unique && !occupied.insert(cell.x * self.n_rows + cell.y) {
                let first = (0..idx)
                    .find(|other| {
                        self.table.placed(*other) == Some(cell)
                            && (self.table.is_placeable(*other)
                                || self.randomly_placed.contains(*other))
                    })
                    .map(|other| self.table.res_id(other))
                    .unwrap_or(res_id);
                return Err(InvariantError::SharedCell {
                    cell,
                    first,
                    second: res_id,
                });
            }
        }

        if !self.randomly_placed.is_empty() {
            let mut holders: FxHashMap<Cell, Vec<usize>> = FxHashMap::default();
            for (idx, cell) in self.table.placements().iter().enumerate() {
                if let Some(cell) = cell {
                    holders.entry(*cell).or_default().push(idx);
                }
            }
            for idx in self.randomly_placed.iter() {
                let Some(cell) = self.table.placed(idx) else {
                    continue;
                };
                if let Some(other) = holders[&cell].iter().find(|other| **other != idx) {
                    return Err(InvariantError::SharedCell {
                        cell,
                        first: self.table.res_id(*other),
                        second: self.table.res_id(idx),
                    });
                }
            }
        }

        if let (Some(grid), Some(expected)) = (self.grid.as_ref(), expected.as_ref()) {
            for x in 0..self.n_cols {
                for y in 0..self.n_rows {
                    let cell = Cell::new(x, y);
                    if grid.count(cell) != expected.count(cell) {
                        return Err(InvariantError::GridMismatch {
                            cell,
                            expected: expected.count(cell),
                            found: grid.count(cell),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
