//! Bands of the capture sphere and the ids of points within them.

use std::fmt;
use std::str::FromStr;

/// One ring (or pole) of capture points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    /// Horizon ring, 11 points.
    Middle,
    /// Ring at +45 degrees, 8 points.
    Upper,
    /// Ring at -45 degrees, 8 points.
    Lower,
    /// Single point straight up.
    North,
    /// Single point straight down.
    South,
}

impl Band {
    /// All bands in construction order.
    pub const ALL: [Band; 5] = [
        Band::Middle,
        Band::Upper,
        Band::Lower,
        Band::North,
        Band::South,
    ];

    /// Number of points in this band.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Band::Middle => 11,
            Band::Upper | Band::Lower => 8,
            Band::North | Band::South => 1,
        }
    }

    /// Elevation of the band relative to the reference horizon, degrees.
    #[must_use]
    pub const fn elevation_deg(self) -> f32 {
        match self {
            Band::Middle => 0.0,
            Band::Upper => 45.0,
            Band::Lower => -45.0,
            Band::North => 90.0,
            Band::South => -90.0,
        }
    }

    /// True for the single-point bands.
    #[must_use]
    pub const fn is_pole(self) -> bool {
        matches!(self, Band::North | Band::South)
    }

    /// Lowercase name used in point ids.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Band::Middle => "middle",
            Band::Upper => "upper",
            Band::Lower => "lower",
            Band::North => "north",
            Band::South => "south",
        }
    }
}

/// Stable key of a capture point, rendered as `"<band>:<index>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId {
    pub band: Band,
    pub index: u8,
}

impl PointId {
    pub const fn new(band: Band, index: u8) -> Self {
        Self { band, index }
    }

    /// The point every grid starts with captured.
    pub const SEED: PointId = PointId::new(Band::Middle, 0);
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.band.name(), self.index)
    }
}

/// Error returned when a string is not a valid point id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid point id `{0}`")]
pub struct ParsePointIdError(pub String);

impl FromStr for PointId {
    type Err = ParsePointIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePointIdError(s.to_string());
        let (name, index) = s.split_once(':').ok_or_else(err)?;
        let band = Band::ALL
            .into_iter()
            .find(|b| b.name() == name)
            .ok_or_else(err)?;
        let index: u8 = index.parse().map_err(|_| err())?;
        if usize::from(index) >= band.count() {
            return Err(err());
        }
        Ok(PointId::new(band, index))
    }
}
