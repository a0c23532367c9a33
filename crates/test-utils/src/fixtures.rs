//! Common test fixtures for solar image tests.
//!
//! This module provides pre-defined observation parameters and builders
//! for AIA level-1 headers and FITS files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use fits_parser::{FitsImage, Header};

use crate::generators::{create_solar_disk, DiskSpec};

/// Common time values for testing.
pub mod time {
    /// A fixed reference observation time (2015-03-11T00:00:00Z)
    pub const REFERENCE_TIME: &str = "2015-03-11T00:00:00Z";

    /// Reference time as a Unix timestamp.
    pub const REFERENCE_TIMESTAMP: i64 = 1_426_032_000;

    /// Solar radius seen from SDO on the reference date, arcsec.
    pub const REFERENCE_RSUN_OBS: f64 = 966.3;
}

/// Reference observation time.
pub fn reference_time() -> DateTime<Utc> {
    Utc.timestamp_opt(time::REFERENCE_TIMESTAMP, 0)
        .single()
        .unwrap_or_default()
}

/// A synthetic AIA level-1 observation.
///
/// The defaults describe a small frame with the disk slightly off-centre,
/// so registration has real work to do.
#[derive(Debug, Clone)]
pub struct AiaFixture {
    pub time: DateTime<Utc>,
    pub wavelength: u16,
    /// Frame edge in pixels.
    pub size: usize,
    /// Plate scale, arcsec per pixel.
    pub cdelt: f64,
    /// Apparent solar radius, arcsec.
    pub rsun_obs: f64,
    /// Exposure time, seconds.
    pub exptime: f64,
    /// Roll angle, degrees.
    pub crota2: f64,
    /// Disk centre offset from the frame centre, pixels.
    pub offset: (f64, f64),
    /// Intensity at disk centre in DN.
    pub peak: f32,
}

impl Default for AiaFixture {
    fn default() -> Self {
        // 64 px covering the standard field of view.
        let size = 64;
        Self {
            time: reference_time(),
            wavelength: 171,
            size,
            cdelt: 0.6 * 4096.0 / size as f64,
            rsun_obs: time::REFERENCE_RSUN_OBS,
            exptime: 2.0,
            crota2: 0.0,
            offset: (1.5, -2.0),
            peak: 1000.0,
        }
    }
}

impl AiaFixture {
    pub fn with_wavelength(mut self, wavelength: u16) -> Self {
        self.wavelength = wavelength;
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.cdelt = 0.6 * 4096.0 / size as f64;
        self.size = size;
        self
    }

    /// Zero-based pixel of the disk centre.
    pub fn disk_center(&self) -> (f64, f64) {
        let c = (self.size as f64 - 1.0) / 2.0;
        (c + self.offset.0, c + self.offset.1)
    }

    /// `T_OBS` as written by the AIA pipeline.
    pub fn t_obs(&self) -> String {
        format!("{}Z", self.date_obs())
    }

    /// `DATE-OBS` with hundredths of a second, no zone designator.
    pub fn date_obs(&self) -> String {
        format!(
            "{}.{:02}",
            self.time.format("%Y-%m-%dT%H:%M:%S"),
            self.time.timestamp_subsec_millis() / 10
        )
    }

    /// Level-1 header for this observation.
    pub fn header(&self) -> Header {
        let (cx, cy) = self.disk_center();
        let mut header = Header::new();
        header.set("TELESCOP", "SDO/AIA");
        header.set("INSTRUME", "AIA_3");
        header.set("T_OBS", self.t_obs());
        header.set("DATE-OBS", self.date_obs());
        header.set("WAVELNTH", self.wavelength as i64);
        header.set("WAVEUNIT", "angstrom");
        header.set("EXPTIME", self.exptime);
        header.set("BUNIT", "DN");
        header.set("LVL_NUM", 1.0);
        header.set("CTYPE1", "HPLN-TAN");
        header.set("CTYPE2", "HPLT-TAN");
        header.set("CUNIT1", "arcsec");
        header.set("CUNIT2", "arcsec");
        header.set("CRPIX1", cx + 1.0);
        header.set("CRPIX2", cy + 1.0);
        header.set("CRVAL1", 0.0);
        header.set("CRVAL2", 0.0);
        header.set("CDELT1", self.cdelt);
        header.set("CDELT2", self.cdelt);
        header.set("CROTA2", self.crota2);
        header.set("SAT_ROT", 0.0);
        header.set("RSUN_OBS", self.rsun_obs);
        header.set("R_SUN", self.rsun_obs / self.cdelt);
        header
    }

    /// Synthetic image: a limb-darkened disk in DN.
    pub fn image(&self) -> FitsImage {
        let (center_x, center_y) = self.disk_center();
        let spec = DiskSpec {
            center_x,
            center_y,
            radius: self.rsun_obs / self.cdelt,
            peak: self.peak,
            ..DiskSpec::centered(self.size)
        };
        FitsImage {
            header: self.header(),
            width: self.size,
            height: self.size,
            data: create_solar_disk(self.size, self.size, spec),
        }
    }

    /// [`AiaFixture::image`] as the bytes of a FITS file, the way a
    /// catalog would serve it.
    pub fn fits_bytes(&self) -> std::io::Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let path = self.write_to(dir.path())?;
        std::fs::read(path)
    }

    /// Cache file name the JSOC would give this observation.
    pub fn cache_file_name(&self) -> String {
        format!(
            "aia_lev1_{}a_{:04}_{:02}_{:02}t{:02}_{:02}_{:02}_{:02}z_image_lev1.fits",
            self.wavelength,
            self.time.year(),
            self.time.month(),
            self.time.day(),
            self.time.hour(),
            self.time.minute(),
            self.time.second(),
            self.time.timestamp_subsec_millis() / 10,
        )
    }

    /// Write the fixture into `dir` under its cache file name.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(self.cache_file_name());
        fits_parser::write_fits(&path, &self.image()).map_err(std::io::Error::other)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_time() {
        assert_eq!(reference_time().to_rfc3339(), "2015-03-11T00:00:00+00:00");
    }

    #[test]
    fn test_header_fields() {
        let fixture = AiaFixture::default();
        let header = fixture.header();
        assert_eq!(header.get_i64("WAVELNTH"), Some(171));
        assert_eq!(header.get_str("T_OBS"), Some("2015-03-11T00:00:00.00Z"));
        assert_eq!(header.get_f64("CDELT1"), Some(38.4));
        assert_eq!(header.get_f64("CRPIX1"), Some(34.0));
    }

    #[test]
    fn test_cache_file_name() {
        let fixture = AiaFixture::default().with_wavelength(193);
        assert_eq!(
            fixture.cache_file_name(),
            "aia_lev1_193a_2015_03_11t00_00_00_00z_image_lev1.fits"
        );
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = AiaFixture::default();
        let path = fixture.write_to(dir.path()).unwrap();
        let image = fits_parser::read_fits(&path).unwrap();
        assert_eq!(image.width, fixture.size);
        assert_eq!(image.header.get_f64("RSUN_OBS"), Some(fixture.rsun_obs));
    }

    #[test]
    fn test_fits_bytes_start_with_primary_header() {
        let bytes = AiaFixture::default().fits_bytes().unwrap();
        assert!(bytes.starts_with(b"SIMPLE  ="));
        assert_eq!(bytes.len() % 2880, 0);
    }
}
