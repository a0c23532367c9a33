//! Disk geometry from calibrated metadata.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GeometryError;
use crate::types::{CalibratedImage, Normalized};

/// Apparent size of the solar disk in a calibrated image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskGeometry {
    /// Plate scale, arcsec per pixel (`CDELT2`).
    pub angular_scale: f64,
    /// Apparent solar radius, arcsec (`RSUN_OBS`).
    pub angular_radius: f64,
    /// `round(angular_radius / angular_scale)`.
    pub pixel_radius: u32,
    /// `R_SUN` from the header, when present.
    pub r_sun: Option<f64>,
}

impl DiskGeometry {
    pub fn from_scale_and_radius(angular_scale: f64, angular_radius: f64) -> Self {
        Self {
            angular_scale,
            angular_radius,
            pixel_radius: (angular_radius / angular_scale).round() as u32,
            r_sun: None,
        }
    }
}

/// Derive the disk geometry of a normalized image.
pub fn extract(image: &CalibratedImage<Normalized>) -> Result<DiskGeometry, GeometryError> {
    let header = image.header();
    let positive = |key: &str| header.get_f64(key).filter(|v| v.is_finite() && *v > 0.0);

    let scale = positive("CDELT2");
    let radius = positive("RSUN_OBS");
    let (Some(scale), Some(radius)) = (scale, radius) else {
        let mut missing = Vec::new();
        if scale.is_none() {
            missing.push("CDELT2");
        }
        if radius.is_none() {
            missing.push("RSUN_OBS");
        }
        return Err(GeometryError::MissingGeometryFields { missing });
    };

    let geometry = DiskGeometry {
        r_sun: header.get_f64("R_SUN"),
        ..DiskGeometry::from_scale_and_radius(scale, radius)
    };
    debug!(
        pixel_radius = geometry.pixel_radius,
        angular_radius = radius,
        angular_scale = scale,
        "extracted disk geometry"
    );
    Ok(geometry)
}
