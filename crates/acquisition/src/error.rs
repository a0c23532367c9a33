//! Error types for acquisition.

use calibration::{CalibrationError, GeometryError, TableError};
use fits_parser::FitsError;
use solar_common::{MetadataKey, SolarError};
use thiserror::Error;

use crate::registry::RegistryFailure;

/// Result type alias using AcquisitionError.
pub type Result<T> = std::result::Result<T, AcquisitionError>;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("No local or remote image for {key}")]
    NotFound { key: MetadataKey },

    #[error("Transport failure for {key}: {message}")]
    Transport { key: MetadataKey, message: String },

    #[error("Remote fetch of {url} failed with status {status}")]
    RemoteFetch { url: String, status: u16 },

    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("Loading {key} failed: {source}")]
    Load {
        key: MetadataKey,
        #[source]
        source: LoadError,
    },

    #[error("Worker for {key} failed: {source}")]
    Worker {
        key: MetadataKey,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("Calibration of {key} failed: {source}")]
    Calibration {
        key: MetadataKey,
        #[source]
        source: CalibrationError,
    },

    #[error("Geometry of {key} unavailable: {source}")]
    MissingGeometryFields {
        key: MetadataKey,
        #[source]
        source: GeometryError,
    },

    #[error("{} registry entries failed after {completed} completed, first: {}", .failures.len(), first_failure(.failures))]
    PartialRegistryFailure {
        failures: Vec<RegistryFailure>,
        completed: usize,
    },

    #[error("FITS error: {0}")]
    Fits(#[from] FitsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] SolarError),

    #[error("Calibration table error: {0}")]
    Table(#[from] TableError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure to read or store the level-1 file behind an acquisition.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("FITS error: {0}")]
    Fits(#[from] FitsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn first_failure(failures: &[RegistryFailure]) -> String {
    failures
        .first()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl AcquisitionError {
    /// The acquisition key this error belongs to, if any.
    pub fn key(&self) -> Option<&MetadataKey> {
        match self {
            AcquisitionError::NotFound { key }
            | AcquisitionError::Transport { key, .. }
            | AcquisitionError::Load { key, .. }
            | AcquisitionError::Worker { key, .. }
            | AcquisitionError::Calibration { key, .. }
            | AcquisitionError::MissingGeometryFields { key, .. } => Some(key),
            _ => None,
        }
    }
}
