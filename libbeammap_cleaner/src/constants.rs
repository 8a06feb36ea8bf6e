// resID = (feedline + 1) * RES_ID_FEEDLINE_DIVISOR + index within feedline
pub const RES_ID_FEEDLINE_DIVISOR: u32 = 10_000;

// MEC: feedlines stacked along x
pub const MEC_N_FEEDLINES: usize = 10;
pub const MEC_FEEDLINE_WIDTH: usize = 14;

// DARKNESS: feedlines stacked along y
pub const DARKNESS_N_FEEDLINES: usize = 5;
pub const DARKNESS_FEEDLINE_WIDTH: usize = 25;

/// Feedline tolerance used when validating the rough coordinates
pub const DEFAULT_FEEDLINE_SLACK: i64 = 0;

/// Offset which moves a precise coordinate onto the pixel-centre convention of the grid
pub const PIXEL_CENTER_OFFSET: f64 = 0.5;

/// Number of columns in a beammap table row: resID, flag, x, y
pub const ENTRIES_PER_LINE: usize = 4;

/// Sentinel written for resonators without a final pixel
pub const UNPLACED_SENTINEL: &str = "nan";
