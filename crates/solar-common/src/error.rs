//! Error types shared by the solar crates.

use thiserror::Error;

/// Result type alias using SolarError.
pub type SolarResult<T> = Result<T, SolarError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolarError {
    #[error("Wavelength {0}A is not an AIA channel")]
    InvalidWavelength(u16),

    #[error("Resolution must be a positive pixel count, got {0}")]
    InvalidResolution(u32),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Rotation number {0} has no representable time")]
    InvalidRotation(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
}
