//! The fixed-order calibration pipeline.
//!
//! pointing → registration → degradation → exposure, applied to either the
//! raw image or its PSF-deconvolved version. The stage types make any other
//! order a compile error.

use tracing::{info, instrument};

use crate::config::CalibrationConfig;
use crate::deconvolution::{deconvolve, PsfModel};
use crate::degradation::{correct_degradation, DegradationTable};
use crate::error::{CalibrationError, CalibrationErrorKind, Result, StageName, TableError};
use crate::exposure::normalize_exposure;
use crate::interpolation::InterpolationMethod;
use crate::pointing::{update_pointing, PointingTable};
use crate::registration::register;
use crate::types::{CalibratedImage, Deconvolved, Normalized, PipelineInput, RawImage};

/// Result of calibrating one raw image.
#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    /// Present when deconvolution was requested.
    pub deconvolved: Option<CalibratedImage<Deconvolved>>,
    pub normalized: CalibratedImage<Normalized>,
}

/// Calibration tables and settings shared by every acquisition.
#[derive(Debug, Clone)]
pub struct CalibrationPipeline {
    pointing: PointingTable,
    degradation: DegradationTable,
    interpolation: InterpolationMethod,
    psf_iterations: usize,
}

impl Default for CalibrationPipeline {
    fn default() -> Self {
        let config = CalibrationConfig::default();
        Self::with_tables(
            PointingTable::empty(),
            DegradationTable::nominal(),
            &config,
        )
    }
}

impl CalibrationPipeline {
    /// Build a pipeline, loading any tables named in `config`.
    pub fn new(config: &CalibrationConfig) -> std::result::Result<Self, TableError> {
        config.validate().map_err(TableError::Invalid)?;
        let pointing = match &config.pointing_table {
            Some(path) => PointingTable::from_json_file(path)?,
            None => PointingTable::empty(),
        };
        let degradation = match &config.degradation_table {
            Some(path) => DegradationTable::from_json_file(path)?,
            None => DegradationTable::nominal(),
        };
        info!(
            pointing_entries = pointing.len(),
            degradation_channels = degradation.channels.len(),
            interpolation = %config.interpolation,
            "calibration tables loaded"
        );
        Ok(Self::with_tables(pointing, degradation, config))
    }

    pub fn with_tables(
        pointing: PointingTable,
        degradation: DegradationTable,
        config: &CalibrationConfig,
    ) -> Self {
        Self {
            pointing,
            degradation,
            interpolation: config.interpolation,
            psf_iterations: config.psf_iterations,
        }
    }

    pub fn interpolation(&self) -> InterpolationMethod {
        self.interpolation
    }

    /// Nominal PSF for `wavelength` with the configured iteration count.
    pub fn psf_model(&self, wavelength: u16) -> Result<PsfModel> {
        PsfModel::nominal(wavelength)
            .map(|psf| psf.with_iterations(self.psf_iterations))
            .ok_or_else(|| {
                CalibrationError::new(
                    StageName::Deconvolution,
                    CalibrationErrorKind::Table(format!("no PSF model for {} A", wavelength)),
                )
            })
    }

    /// Run the four calibration stages in order.
    pub fn run<S: PipelineInput>(
        &self,
        input: &CalibratedImage<S>,
        resolution: u32,
    ) -> Result<CalibratedImage<Normalized>> {
        let pointed = update_pointing(input, &self.pointing)?;
        let registered = register(&pointed, resolution, self.interpolation)?;
        let corrected = correct_degradation(&registered, &self.degradation)?;
        normalize_exposure(&corrected)
    }

    /// Calibrate a raw image, optionally deconvolving it first.
    ///
    /// The stage input is chosen once: the deconvolved image when
    /// `apply_deconvolution` is set, the raw image otherwise.
    #[instrument(skip(self, raw), fields(source = %raw.source()))]
    pub fn calibrate(
        &self,
        raw: &RawImage,
        wavelength: u16,
        resolution: u32,
        apply_deconvolution: bool,
        use_accelerated: bool,
    ) -> Result<CalibrationOutput> {
        if apply_deconvolution {
            let psf = self.psf_model(wavelength)?;
            let deconvolved = deconvolve(raw, &psf, use_accelerated)?;
            let normalized = self.run(&deconvolved, resolution)?;
            Ok(CalibrationOutput {
                deconvolved: Some(deconvolved),
                normalized,
            })
        } else {
            let normalized = self.run(&raw.to_unprocessed(), resolution)?;
            Ok(CalibrationOutput {
                deconvolved: None,
                normalized,
            })
        }
    }
}
