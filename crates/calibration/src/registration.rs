//! Registration onto the level-1.5 grid.
//!
//! The output grid is north up with the disk centre on the middle of the
//! array and a plate scale of `0.6 * 4096 / resolution` arcsec per pixel,
//! so a 4096 px request reproduces the standard AIA level-1.5 grid and
//! smaller requests cover the same field of view.

use fits_parser::Header;
use tracing::{debug, info, instrument};

use crate::error::{CalibrationError, CalibrationErrorKind, Result, StageName};
use crate::interpolation::InterpolationMethod;
use crate::pointing::set_rotation_matrix;
use crate::types::{CalibratedImage, PixelGrid, Pointed, Registered};

const STAGE: StageName = StageName::Registration;

/// Plate scale of the full-resolution level-1.5 grid, arcsec per pixel.
pub const BASE_PLATE_SCALE: f64 = 0.6;

/// Edge length of the full-resolution level-1.5 grid.
pub const BASE_RESOLUTION: u32 = 4096;

/// Level number written after registration.
pub const REGISTERED_LEVEL: f64 = 1.5;

/// Plate scale for a `resolution`-pixel output grid.
pub fn plate_scale(resolution: u32) -> f64 {
    BASE_PLATE_SCALE * BASE_RESOLUTION as f64 / resolution as f64
}

/// Linear world coordinate system of an image (rotation in degrees).
#[derive(Debug, Clone, Copy)]
struct Wcs {
    crpix1: f64,
    crpix2: f64,
    cdelt1: f64,
    cdelt2: f64,
    crval1: f64,
    crval2: f64,
    crota2: f64,
}

impl Wcs {
    fn from_image(image: &CalibratedImage<Pointed>) -> Result<Self> {
        let wcs = Self {
            crpix1: image.require_f64(STAGE, "CRPIX1")?,
            crpix2: image.require_f64(STAGE, "CRPIX2")?,
            cdelt1: image.require_f64(STAGE, "CDELT1")?,
            cdelt2: image.require_f64(STAGE, "CDELT2")?,
            crval1: image.require_f64(STAGE, "CRVAL1")?,
            crval2: image.require_f64(STAGE, "CRVAL2")?,
            crota2: image.require_f64(STAGE, "CROTA2")?,
        };
        if wcs.cdelt1 == 0.0 {
            return Err(CalibrationError::invalid(STAGE, "CDELT1", "zero plate scale"));
        }
        if wcs.cdelt2 == 0.0 {
            return Err(CalibrationError::invalid(STAGE, "CDELT2", "zero plate scale"));
        }
        Ok(wcs)
    }

    /// Zero-based source pixel for world coordinates in arcsec.
    #[inline]
    fn world_to_pixel(&self, sin: f64, cos: f64, x: f64, y: f64) -> (f64, f64) {
        let u = (x - self.crval1) / self.cdelt1;
        let v = (y - self.crval2) / self.cdelt2;
        let di = cos * u + sin * v;
        let dj = -sin * u + cos * v;
        (self.crpix1 - 1.0 + di, self.crpix2 - 1.0 + dj)
    }
}

/// Resample `image` onto a `resolution x resolution` level-1.5 grid.
///
/// Output pixels that fall outside the input take the input's smallest
/// finite value.
#[instrument(skip(image), fields(width = image.grid().width, height = image.grid().height))]
pub fn register(
    image: &CalibratedImage<Pointed>,
    resolution: u32,
    method: InterpolationMethod,
) -> Result<CalibratedImage<Registered>> {
    image.check_grid(STAGE)?;
    if resolution == 0 {
        return Err(CalibrationError::new(
            STAGE,
            CalibrationErrorKind::InvalidData("resolution must be > 0".to_string()),
        ));
    }
    let wcs = Wcs::from_image(image)?;
    let rsun_obs = image.require_f64(STAGE, "RSUN_OBS")?;
    if rsun_obs <= 0.0 {
        return Err(CalibrationError::invalid(STAGE, "RSUN_OBS", "must be positive"));
    }

    let source = image.grid();
    let fill = source.finite_min().unwrap_or(0.0);

    let size = resolution as usize;
    let scale = plate_scale(resolution);
    let center = resolution as f64 / 2.0 + 0.5;
    let (sin, cos) = wcs.crota2.to_radians().sin_cos();

    let mut data = vec![fill; size * size];
    let mut outside = 0usize;
    for (oy, row) in data.chunks_mut(size).enumerate() {
        let world_y = scale * (oy as f64 + 1.0 - center);
        for (ox, value) in row.iter_mut().enumerate() {
            let world_x = scale * (ox as f64 + 1.0 - center);
            let (sx, sy) = wcs.world_to_pixel(sin, cos, world_x, world_y);
            match method.sample(source, sx, sy) {
                Some(v) => *value = v,
                None => outside += 1,
            }
        }
    }

    let header = registered_header(image.header(), resolution, scale, center, rsun_obs);

    debug!(
        scale,
        crota2 = wcs.crota2,
        outside,
        %method,
        "resampled onto level-1.5 grid"
    );
    info!(resolution, "registered image");

    Ok(CalibratedImage::from_parts(
        PixelGrid {
            data,
            width: size,
            height: size,
        },
        header,
    ))
}

fn registered_header(
    header: &Header,
    resolution: u32,
    scale: f64,
    center: f64,
    rsun_obs: f64,
) -> Header {
    let mut header = header.clone();
    header.set("NAXIS1", resolution as i64);
    header.set("NAXIS2", resolution as i64);
    header.set("CDELT1", scale);
    header.set("CDELT2", scale);
    header.set("CRPIX1", center);
    header.set("CRPIX2", center);
    header.set("CRVAL1", 0.0);
    header.set("CRVAL2", 0.0);
    header.set("CROTA2", 0.0);
    set_rotation_matrix(&mut header, 0.0);
    header.set_with_comment("R_SUN", rsun_obs / scale, "solar radius in pixels");
    header.set_with_comment("LVL_NUM", REGISTERED_LEVEL, "data level");
    header.add_history(&format!(
        "registered to {}x{} at {:.4} arcsec/px",
        resolution, resolution, scale
    ));
    header
}
