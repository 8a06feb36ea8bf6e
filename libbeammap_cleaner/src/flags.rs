use std::fmt::Display;

use super::error::FlagError;

/// The beammap flag taxonomy shared with the upstream beammapping tools.
///
/// Flags are mutually exclusive. Only `Good` and `Double` resonators take part in grid
/// placement; the cleaner adds `WrongFeedline` and `DuplicatePixel`, and never clears any
/// of the upstream failure flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BeamMapFlag {
    #[default]
    Good,
    Failed,
    XFailed,
    YFailed,
    Double,
    WrongFeedline,
    DuplicatePixel,
    NoDacTone,
}

impl BeamMapFlag {
    pub const ALL: [BeamMapFlag; 8] = [
        BeamMapFlag::Good,
        BeamMapFlag::Failed,
        BeamMapFlag::XFailed,
        BeamMapFlag::YFailed,
        BeamMapFlag::Double,
        BeamMapFlag::WrongFeedline,
        BeamMapFlag::DuplicatePixel,
        BeamMapFlag::NoDacTone,
    ];

    /// Integer code used in beammap tables
    pub fn code(&self) -> u8 {
        match self {
            Self::Good => 0,
            Self::Failed => 1,
            Self::XFailed => 2,
            Self::YFailed => 3,
            Self::Double => 4,
            Self::WrongFeedline => 5,
            Self::DuplicatePixel => 6,
            Self::NoDacTone => 7,
        }
    }

    /// Can a resonator with this flag be placed on the grid
    pub fn is_placeable(&self) -> bool {
        matches!(self, Self::Good | Self::Double)
    }

    /// Flags assigned by the cleaner which forbid any placement
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::WrongFeedline | Self::DuplicatePixel)
    }
}

impl TryFrom<i64> for BeamMapFlag {
    type Error = FlagError;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Good),
            1 => Ok(Self::Failed),
            2 => Ok(Self::XFailed),
            3 => Ok(Self::YFailed),
            4 => Ok(Self::Double),
            5 => Ok(Self::WrongFeedline),
            6 => Ok(Self::DuplicatePixel),
            7 => Ok(Self::NoDacTone),
            _ => Err(FlagError::UnknownCode(value)),
        }
    }
}

impl Display for BeamMapFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Good => "good",
            Self::Failed => "failed",
            Self::XFailed => "xFailed",
            Self::YFailed => "yFailed",
            Self::Double => "double",
            Self::WrongFeedline => "wrongFeedline",
            Self::DuplicatePixel => "duplicatePixel",
            Self::NoDacTone => "noDacTone",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        for flag in BeamMapFlag::ALL {
            let back = BeamMapFlag::try_from(flag.code() as i64).unwrap();
            assert_eq!(back, flag);
        }
        assert!(BeamMapFlag::try_from(8).is_err());
        assert!(BeamMapFlag::try_from(-1).is_err());
    }

    #[test]
    fn test_placeable() {
        let placeable: Vec<BeamMapFlag> = BeamMapFlag::ALL
            .into_iter()
            .filter(|f| f.is_placeable())
            .collect();
        assert_eq!(placeable, vec![BeamMapFlag::Good, BeamMapFlag::Double]);
        assert!(BeamMapFlag::WrongFeedline.is_rejected());
        assert!(!BeamMapFlag::Failed.is_rejected());
    }
}
