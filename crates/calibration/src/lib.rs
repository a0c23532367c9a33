//! Calibration of AIA level-1 images to level 1.5.
//!
//! Images move through typed stages:
//!
//! ```text
//! RawImage ─┬─────────────── Unprocessed ─┐
//!           └─ deconvolve ── Deconvolved ─┴─ update_pointing ── Pointed
//!   ── register ── Registered ── correct_degradation ── DegradationCorrected
//!   ── normalize_exposure ── Normalized ── geometry::extract ── DiskGeometry
//! ```
//!
//! Each stage borrows its input and returns a new [`CalibratedImage`], and
//! only accepts the stage before it. [`CalibrationPipeline`] holds the
//! calibration tables and runs the whole chain.
//!
//! Skipping a stage does not compile:
//!
//! ```compile_fail
//! use calibration::{normalize_exposure, CalibratedImage, Pointed};
//!
//! fn skip(image: &CalibratedImage<Pointed>) {
//!     let _ = normalize_exposure(image);
//! }
//! ```

pub mod config;
pub mod deconvolution;
pub mod degradation;
pub mod error;
pub mod exposure;
pub mod geometry;
pub mod interpolation;
pub mod pipeline;
pub mod pointing;
pub mod registration;
pub mod types;

pub use config::CalibrationConfig;
pub use deconvolution::{deconvolve, ComputeBackend, PsfModel};
pub use degradation::{correct_degradation, DegradationEpoch, DegradationTable};
pub use error::{
    CalibrationError, CalibrationErrorKind, GeometryError, Result, StageName, TableError,
};
pub use exposure::normalize_exposure;
pub use geometry::{extract, DiskGeometry};
pub use interpolation::{InterpolationMethod, UnknownInterpolation};
pub use pipeline::{CalibrationOutput, CalibrationPipeline};
pub use pointing::{update_pointing, ChannelPointing, PointingEntry, PointingTable};
pub use registration::{plate_scale, register};
pub use types::{
    CalibratedImage, CalibrationStage, DegradationCorrected, Deconvolved, ImageSource,
    Normalized, PipelineInput, PixelGrid, Pointed, RawImage, Registered, Stage, Unprocessed,
};
