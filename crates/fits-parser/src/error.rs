//! Error types for FITS reading and writing.

use thiserror::Error;

/// Result type for FITS operations.
pub type FitsResult<T> = Result<T, FitsError>;

/// Errors that can occur while reading or writing FITS data.
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cfitsio error: {0}")]
    Cfitsio(#[from] fitsio::errors::Error),

    #[error("cfitsio call {call} failed with status {status}")]
    Status { call: &'static str, status: i32 },

    #[error("Malformed header card {index}: {message}")]
    MalformedCard { index: usize, message: String },

    #[error("Unsupported FITS feature: {0}")]
    Unsupported(String),

    #[error("Image is {width}x{height} but holds {len} pixels")]
    ShapeMismatch {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("File contains no image data")]
    NoImage,
}
