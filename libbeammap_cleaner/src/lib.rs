//! # beammap_cleaner
//!
//! beammap_cleaner turns a rough MKID beammap into a final, one-resonator-per-pixel beammap,
//! written in Rust. It takes the rough beammap produced by the beammapping tools (a
//! measured, sub-pixel position for every resonator of the array) and assigns each
//! resonator an integer pixel, ready to be consumed by the readout dashboard.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will
//! need to install the Rust tool chain; see the
//! [Rust docs](https://www.rust-lang.org/tools/install) for instructions.
//!
//! To build and install the CLI use `cargo install --path ./beammap_cleaner_cli` from the
//! top level repository. The binary will be installed to your cargo install location
//! (typically `~/.cargo/bin/`).
//!
//! ## What cleaning does
//!
//! Cleaning is a single pass with four steps, run by the
//! [`BeammapCleaner`](cleaner::BeammapCleaner):
//!
//! 1. Feedline validation: each good/double resonator must be measured on the feedline
//!    encoded in its resID (`resID / 10000 - 1`). Resonators which are not are flagged
//!    `wrongFeedline` and lose their coordinates.
//! 2. Grid construction: the precise coordinates are floored onto the pixel grid and the
//!    number of resonators on each pixel is counted.
//! 3. Overlap resolution: every pixel claimed by more than one resonator is resolved by
//!    moving claimants to the nearest empty pixels of the surrounding 3x3 ring which are on
//!    the same feedline. If the ring runs out, the claimant closest to the pixel centre keeps
//!    the pixel and the rest are flagged `duplicatePixel`. Rings further out are never
//!    searched.
//! 4. Finalization: flag counts and pixel displacement statistics are logged.
//!
//! Resonators which end up without a pixel can optionally be scattered randomly over the
//! empty pixels of their feedline. This is off by default.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! num_rows: 146
//! num_cols: 140
//! flip: false
//! instrument: mec
//! rough_beammap_file: beammap_rough.txt
//! final_beammap_file: beammap_final.txt
//! beammap_directory: /path/to/beammaps
//! ```
//!
//! `instrument` is one of `mec` (10 feedlines of 14 pixels along x) or `darkness`
//! (5 feedlines of 25 pixels along y). `flip` reverses the feedline order. The upstream
//! camelCase keys (`numRows`, `roughBMFile`, ...) are accepted as well.
//!
//! ## Beammap Format
//!
//! Both the rough and the final beammap are whitespace delimited text tables with one
//! resonator per line:
//!
//! ```text
//! resID flag x y
//! ```
//!
//! In the rough beammap `x` and `y` are precise (floating point) coordinates; in the final
//! beammap they are integer pixels, or `nan` for resonators without a pixel. Lines starting
//! with `#` are ignored. The flags are:
//!
//! | code | flag           |
//! |------|----------------|
//! | 0    | good           |
//! | 1    | failed         |
//! | 2    | xFailed        |
//! | 3    | yFailed        |
//! | 4    | double         |
//! | 5    | wrongFeedline  |
//! | 6    | duplicatePixel |
//! | 7    | noDacTone      |
pub mod beammap_file;
pub mod cleaner;
pub mod config;
pub mod constants;
pub mod error;
pub mod feedline;
pub mod flags;
pub mod occupancy;
pub mod overlap;
pub mod process;
pub mod resonator;
