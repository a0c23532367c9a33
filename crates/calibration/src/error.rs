//! Error types for calibration.

use std::fmt;

use thiserror::Error;

/// Calibration stage names, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    Deconvolution,
    Pointing,
    Registration,
    Degradation,
    Exposure,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deconvolution => "deconvolution",
            Self::Pointing => "pointing",
            Self::Registration => "registration",
            Self::Degradation => "degradation",
            Self::Exposure => "exposure",
        };
        f.write_str(name)
    }
}

/// What went wrong inside a stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationErrorKind {
    /// A required header keyword is absent.
    #[error("missing header field {0}")]
    MissingField(&'static str),

    /// A header keyword is present but unusable.
    #[error("invalid header field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The image has not been through a prerequisite stage.
    #[error("image is not ready: {0}")]
    NotReady(String),

    /// A calibration table has no usable entry.
    #[error("calibration table: {0}")]
    Table(String),

    /// Pixel data is unusable.
    #[error("invalid pixel data: {0}")]
    InvalidData(String),
}

/// A stage failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} stage failed: {kind}")]
pub struct CalibrationError {
    pub stage: StageName,
    pub kind: CalibrationErrorKind,
}

impl CalibrationError {
    pub fn new(stage: StageName, kind: CalibrationErrorKind) -> Self {
        Self { stage, kind }
    }

    pub fn missing(stage: StageName, field: &'static str) -> Self {
        Self::new(stage, CalibrationErrorKind::MissingField(field))
    }

    pub fn invalid(stage: StageName, field: &'static str, reason: impl Into<String>) -> Self {
        Self::new(
            stage,
            CalibrationErrorKind::InvalidField {
                field,
                reason: reason.into(),
            },
        )
    }
}

/// Disk geometry cannot be derived from the header.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("missing or non-positive geometry fields: {}", missing.join(", "))]
    MissingGeometryFields { missing: Vec<&'static str> },
}

/// Loading a calibration table failed.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid table JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid table: {0}")]
    Invalid(String),
}

/// Result type for calibration stages.
pub type Result<T> = std::result::Result<T, CalibrationError>;
