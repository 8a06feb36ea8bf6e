use std::path::PathBuf;
use thiserror::Error;

use super::cleaner::CleanerStage;
use super::config::Instrument;
use super::flags::BeamMapFlag;
use super::resonator::Cell;

#[derive(Debug, Clone, Error)]
pub enum FlagError {
    #[error("Unknown beammap flag code {0}")]
    UnknownCode(i64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Beammap path {0:?} named by the config does not exist")]
    MissingBeammapPath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid array dimension: {0} must be at least 1")]
    InvalidDimension(&'static str),
    #[error("Config instrument {instrument} needs {extent} pixels along its feedline axis but the array only has {available}")]
    FeedlinesDoNotFit {
        instrument: Instrument,
        extent: usize,
        available: usize,
    },
}

#[derive(Debug, Error)]
pub enum BeammapFileError {
    #[error("Could not open beammap because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Beammap file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Beammap line {line} has {found} columns; expected {expected}")]
    BadFileFormat {
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("Beammap line {line} has an invalid integer '{value}' in column {column}")]
    BadInteger {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("Beammap line {line} has an invalid float '{value}' in column {column}")]
    BadFloat {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("Beammap line {line} has a bad flag: {source}")]
    BadFlag {
        line: usize,
        #[source]
        source: FlagError,
    },
    #[error("Beammap line {line} repeats resonator ID {res_id}")]
    DuplicateResID { line: usize, res_id: u32 },
    #[error("Beammap file {0:?} contains no resonators")]
    EmptyTable(PathBuf),
}

#[derive(Debug, Error)]
pub enum CleanerError {
    #[error("BeammapCleaner cannot {operation} while in stage {stage}")]
    OutOfOrder {
        operation: &'static str,
        stage: CleanerStage,
    },
}

#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("Resonators {first} and {second} share pixel {cell}")]
    SharedCell { cell: Cell, first: u32, second: u32 },
    #[error("Resonator {res_id} is placed at {cell}, outside of the array")]
    OutOfBounds { res_id: u32, cell: Cell },
    #[error("Resonator {res_id} is flagged {flag} but still has a pixel")]
    RejectedButPlaced { res_id: u32, flag: BeamMapFlag },
    #[error("Occupancy at {cell} is {found} but {expected} resonators are placed there")]
    GridMismatch {
        cell: Cell,
        expected: u32,
        found: u32,
    },
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to beammap file error: {0}")]
    FileError(#[from] BeammapFileError),
    #[error("Processor failed due to BeammapCleaner error: {0}")]
    CleanerError(#[from] CleanerError),
    #[error("Processor produced an inconsistent beammap: {0}")]
    InvariantError(#[from] InvariantError),
}
