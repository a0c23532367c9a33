//! Instrument and channel vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SolarError;

/// Wavelength channels (in angstrom) recorded by AIA.
pub const AIA_WAVELENGTHS: [u16; 10] = [94, 131, 171, 193, 211, 304, 335, 1600, 1700, 4500];

/// Native AIA detector edge length in pixels.
pub const DEFAULT_RESOLUTION: u32 = 4096;

/// Check whether `wavelength` is one of the AIA channels.
pub fn is_aia_channel(wavelength: u16) -> bool {
    AIA_WAVELENGTHS.contains(&wavelength)
}

/// Instrument tag used for catalog queries and cache file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Aia,
}

impl Instrument {
    /// Catalog tag ("AIA").
    pub fn tag(&self) -> &'static str {
        match self {
            Instrument::Aia => "AIA",
        }
    }

    /// File name prefix used by local level-1 files ("aia").
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Instrument::Aia => "aia",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Instrument {
    type Err = SolarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aia" => Ok(Instrument::Aia),
            other => Err(SolarError::UnknownInstrument(other.to_string())),
        }
    }
}
