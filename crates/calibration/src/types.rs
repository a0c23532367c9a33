//! Core image types.

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

use fits_parser::{FitsImage, Header};
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, CalibrationErrorKind, StageName};

/// Row-major 2-D pixel array in FITS storage order (row 0 is the first
/// stored row, i.e. the bottom of the image).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl PixelGrid {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Option<Self> {
        (data.len() == width * height && width > 0 && height > 0).then_some(Self {
            data,
            width,
            height,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Smallest finite pixel value.
    pub fn finite_min(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f32| m.min(v))))
    }

    /// Sum of finite pixel values.
    pub fn finite_sum(&self) -> f64 {
        self.data
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| *v as f64)
            .sum()
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.iter().map(|v| f(*v)).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Where a raw image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    LocalCache(PathBuf),
    Remote(String),
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalCache(path) => write!(f, "cache:{}", path.display()),
            Self::Remote(id) => write!(f, "remote:{}", id),
        }
    }
}

/// An image exactly as acquired. Never modified after creation.
#[derive(Debug, Clone)]
pub struct RawImage {
    grid: PixelGrid,
    header: Header,
    source: ImageSource,
}

impl RawImage {
    pub fn new(grid: PixelGrid, header: Header, source: ImageSource) -> Self {
        Self {
            grid,
            header,
            source,
        }
    }

    /// Wrap a decoded FITS image.
    pub fn from_fits(image: FitsImage, source: ImageSource) -> Self {
        Self {
            grid: PixelGrid {
                data: image.data,
                width: image.width,
                height: image.height,
            },
            header: image.header,
            source,
        }
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Start a calibration chain from a copy of this image.
    pub fn to_unprocessed(&self) -> CalibratedImage<Unprocessed> {
        CalibratedImage::from_parts(self.grid.clone(), self.header.clone())
    }
}

/// How far an image has been calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CalibrationStage {
    None,
    Deconvolved,
    Pointed,
    Registered,
    DegradationCorrected,
    Normalized,
}

impl fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Deconvolved => "deconvolved",
            Self::Pointed => "pointed",
            Self::Registered => "registered",
            Self::DegradationCorrected => "degradation-corrected",
            Self::Normalized => "normalized",
        };
        f.write_str(name)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Type-level calibration stage.
pub trait Stage: sealed::Sealed + Send + Sync + 'static {
    const STAGE: CalibrationStage;
}

/// Stages that may feed the pointing update.
pub trait PipelineInput: Stage {}

macro_rules! stage_marker {
    ($name:ident, $stage:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;
        impl sealed::Sealed for $name {}
        impl Stage for $name {
            const STAGE: CalibrationStage = $stage;
        }
    };
}

stage_marker!(Unprocessed, CalibrationStage::None);
stage_marker!(Deconvolved, CalibrationStage::Deconvolved);
stage_marker!(Pointed, CalibrationStage::Pointed);
stage_marker!(Registered, CalibrationStage::Registered);
stage_marker!(DegradationCorrected, CalibrationStage::DegradationCorrected);
stage_marker!(Normalized, CalibrationStage::Normalized);

impl PipelineInput for Unprocessed {}
impl PipelineInput for Deconvolved {}

/// An image at calibration stage `S`.
///
/// Stage functions consume a reference to the previous stage and return a
/// new value, so each intermediate result stays available to the caller.
#[derive(Debug, Clone)]
pub struct CalibratedImage<S: Stage> {
    grid: PixelGrid,
    header: Header,
    _stage: PhantomData<S>,
}

impl<S: Stage> CalibratedImage<S> {
    pub(crate) fn from_parts(grid: PixelGrid, header: Header) -> Self {
        Self {
            grid,
            header,
            _stage: PhantomData,
        }
    }

    pub fn stage(&self) -> CalibrationStage {
        S::STAGE
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    #[cfg(test)]
    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Convert into a FITS image for writing.
    pub fn to_fits(&self) -> FitsImage {
        FitsImage {
            header: self.header.clone(),
            width: self.grid.width,
            height: self.grid.height,
            data: self.grid.data.clone(),
        }
    }

    pub(crate) fn require_f64(
        &self,
        stage: StageName,
        field: &'static str,
    ) -> Result<f64, CalibrationError> {
        let value = self
            .header
            .get_f64(field)
            .ok_or(CalibrationError::missing(stage, field))?;
        if !value.is_finite() {
            return Err(CalibrationError::invalid(stage, field, "not finite"));
        }
        Ok(value)
    }

    pub(crate) fn require_wavelength(&self, stage: StageName) -> Result<u16, CalibrationError> {
        let wl = self.require_f64(stage, "WAVELNTH")?;
        if wl <= 0.0 || wl > u16::MAX as f64 {
            return Err(CalibrationError::invalid(
                stage,
                "WAVELNTH",
                format!("{} is out of range", wl),
            ));
        }
        Ok(wl.round() as u16)
    }

    /// Observation time from `T_OBS`, falling back to `DATE-OBS`.
    pub(crate) fn observation_time(
        &self,
        stage: StageName,
    ) -> Result<chrono::DateTime<chrono::Utc>, CalibrationError> {
        let (field, raw) = match self.header.get_str("T_OBS") {
            Some(t) => ("T_OBS", t),
            None => (
                "DATE-OBS",
                self.header
                    .get_str("DATE-OBS")
                    .ok_or(CalibrationError::missing(stage, "T_OBS"))?,
            ),
        };
        solar_common::parse_time(raw).map_err(|e| CalibrationError::invalid(stage, field, e.to_string()))
    }

    pub(crate) fn check_grid(&self, stage: StageName) -> Result<(), CalibrationError> {
        if self.grid.data.len() != self.grid.width * self.grid.height || self.grid.width == 0 {
            return Err(CalibrationError::new(
                stage,
                CalibrationErrorKind::InvalidData(format!(
                    "{}x{} grid holds {} pixels",
                    self.grid.width,
                    self.grid.height,
                    self.grid.data.len()
                )),
            ));
        }
        Ok(())
    }
}
