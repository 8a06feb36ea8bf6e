use super::config::{Config, FeedlineAxis, Instrument};
use super::constants::{DEFAULT_FEEDLINE_SLACK, RES_ID_FEEDLINE_DIVISOR};
use super::resonator::Cell;

/// FeedlineValidator decides whether a coordinate lies on the feedline encoded in a resID.
///
/// The feedline of a coordinate is found by dividing the instrument's feedline axis into
/// strips of the feedline width. A `flip`ped array reverses the feedline order. The `slack`
/// tolerance accepts an observed feedline exactly `slack` strips away from the expected one
/// on either side (with the default slack of 0 only an exact match is accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedlineValidator {
    instrument: Instrument,
    slack: i64,
    flip: bool,
}

impl FeedlineValidator {
    pub fn new(instrument: Instrument, slack: i64, flip: bool) -> Self {
        Self {
            instrument,
            slack,
            flip,
        }
    }

    /// Validator for a configuration, using the default slack
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.instrument, DEFAULT_FEEDLINE_SLACK, config.flip)
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// The feedline a resonator is wired to, in array order
    pub fn expected_feedline(&self, res_id: u32) -> i64 {
        let feedline = (res_id / RES_ID_FEEDLINE_DIVISOR) as i64 - 1;
        if self.flip {
            self.instrument.n_feedlines() as i64 - feedline - 1
        } else {
            feedline
        }
    }

    /// The feedline strip a coordinate falls in. None if the coordinate is not finite
    pub fn observed_feedline(&self, x: f64, y: f64) -> Option<i64> {
        let coord = match self.instrument.feedline_axis() {
            FeedlineAxis::X => x,
            FeedlineAxis::Y => y,
        };
        if !coord.is_finite() {
            return None;
        }
        Some((coord / self.instrument.feedline_width() as f64).floor() as i64)
    }

    /// Is the coordinate (x, y) on the feedline of resonator `res_id`
    pub fn classify(&self, res_id: u32, x: f64, y: f64) -> bool {
        let expected = self.expected_feedline(res_id);
        match self.observed_feedline(x, y) {
            Some(observed) => {
                observed - self.slack == expected || observed + self.slack == expected
            }
            None => false,
        }
    }

    pub fn classify_cell(&self, res_id: u32, cell: Cell) -> bool {
        self.classify(res_id, cell.x as f64, cell.y as f64)
    }
}
