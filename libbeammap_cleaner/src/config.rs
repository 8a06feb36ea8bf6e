use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

use super::constants::{
    DARKNESS_FEEDLINE_WIDTH, DARKNESS_N_FEEDLINES, MEC_FEEDLINE_WIDTH, MEC_N_FEEDLINES,
};
use super::error::ConfigError;

/// The array axis along which an instrument's feedlines are stacked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedlineAxis {
    X,
    Y,
}

/// The MKID instruments with a known feedline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    #[serde(alias = "MEC")]
    Mec,
    #[serde(alias = "DARKNESS")]
    Darkness,
}

impl Instrument {
    pub fn n_feedlines(&self) -> usize {
        match self {
            Self::Mec => MEC_N_FEEDLINES,
            Self::Darkness => DARKNESS_N_FEEDLINES,
        }
    }

    /// Width of a single feedline in pixels
    pub fn feedline_width(&self) -> usize {
        match self {
            Self::Mec => MEC_FEEDLINE_WIDTH,
            Self::Darkness => DARKNESS_FEEDLINE_WIDTH,
        }
    }

    pub fn feedline_axis(&self) -> FeedlineAxis {
        match self {
            Self::Mec => FeedlineAxis::X,
            Self::Darkness => FeedlineAxis::Y,
        }
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mec => write!(f, "mec"),
            Self::Darkness => write!(f, "darkness"),
        }
    }
}

/// Structure representing the cleaner configuration. Contains the array geometry and
/// the beammap file locations.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(alias = "numRows")]
    pub num_rows: usize,
    #[serde(alias = "numCols")]
    pub num_cols: usize,
    pub flip: bool,
    pub instrument: Instrument,
    #[serde(alias = "roughBMFile", alias = "roughBeammapFile")]
    pub rough_beammap_file: PathBuf,
    #[serde(alias = "finalBMFile", alias = "finalBeammapFile")]
    pub final_beammap_file: PathBuf,
    #[serde(alias = "beammapDirectory")]
    pub beammap_directory: PathBuf,
}

impl Default for Config {
    /// Generate a new Config object sized for MEC. File paths will be invalid
    fn default() -> Self {
        Self {
            num_rows: 146,
            num_cols: 140,
            flip: false,
            instrument: Instrument::Mec,
            rough_beammap_file: PathBuf::from("beammap_rough.txt"),
            final_beammap_file: PathBuf::from("beammap_final.txt"),
            beammap_directory: PathBuf::from("None"),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful and valid
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the array geometry against the instrument layout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_rows == 0 {
            return Err(ConfigError::InvalidDimension("num_rows"));
        }
        if self.num_cols == 0 {
            return Err(ConfigError::InvalidDimension("num_cols"));
        }

        let extent = self.instrument.n_feedlines() * self.instrument.feedline_width();
        let available = match self.instrument.feedline_axis() {
            FeedlineAxis::X => self.num_cols,
            FeedlineAxis::Y => self.num_rows,
        };
        if extent > available {
            return Err(ConfigError::FeedlinesDoNotFit {
                instrument: self.instrument,
                extent,
                available,
            });
        }
        Ok(())
    }

    /// Get the path to the rough (input) beammap
    pub fn get_rough_beammap_path(&self) -> Result<PathBuf, ConfigError> {
        let path = self.beammap_directory.join(&self.rough_beammap_file);
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::MissingBeammapPath(path))
        }
    }

    /// Get the path to the final (output) beammap. Its directory must already exist
    pub fn get_final_beammap_path(&self) -> Result<PathBuf, ConfigError> {
        let path = self.beammap_directory.join(&self.final_beammap_file);
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                Err(ConfigError::MissingBeammapPath(parent.to_path_buf()))
            }
            _ => Ok(path),
        }
    }
}
