//! Configuration for the calibration pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::interpolation::InterpolationMethod;

/// Default Richardson-Lucy iteration count.
pub const DEFAULT_PSF_ITERATIONS: usize = 25;

/// Configuration for the calibration pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Interpolation method for registration.
    pub interpolation: InterpolationMethod,

    /// Richardson-Lucy iterations for PSF deconvolution.
    pub psf_iterations: usize,

    /// JSON pointing table; the header pointing is used when absent.
    pub pointing_table: Option<PathBuf>,

    /// JSON degradation table; the built-in nominal table is used when absent.
    pub degradation_table: Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationMethod::Bilinear,
            psf_iterations: DEFAULT_PSF_ITERATIONS,
            pointing_table: None,
            degradation_table: None,
        }
    }
}

impl CalibrationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SDO_INTERPOLATION") {
            match val.parse() {
                Ok(method) => config.interpolation = method,
                Err(e) => warn!(error = %e, "Ignoring SDO_INTERPOLATION"),
            }
        }

        if let Ok(val) = std::env::var("SDO_PSF_ITERATIONS") {
            if let Ok(n) = val.parse() {
                config.psf_iterations = n;
            }
        }

        if let Ok(val) = std::env::var("SDO_POINTING_TABLE") {
            config.pointing_table = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SDO_DEGRADATION_TABLE") {
            config.degradation_table = Some(PathBuf::from(val));
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.psf_iterations == 0 {
            return Err("psf_iterations must be > 0".to_string());
        }
        Ok(())
    }
}
