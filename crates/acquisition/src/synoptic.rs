//! Synoptic maps: one Carrington rotation per file.
//!
//! Maps are addressed by wavelength and rotation number only:
//!
//! ```text
//! remote: <base_url>/AIA{wl:04}/CR{rot:04}.fits
//! local:  <data_dir>/AIA0{wl:04}_CR{rot:04}.fits
//! ```
//!
//! A missing local file is downloaded in full and kept only if it reads
//! back as FITS. The published maps carry wrong coordinate units, so
//! `CUNIT1` and `CUNIT2` are set to `arcsec` every time a map is loaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calibration::{ImageSource, RawImage};
use chrono::{DateTime, Utc};
use fits_parser::{FitsImage, Header};
use solar_common::{carrington_rotation_time, synoptic_rotation, SolarResult};
use tracing::{info, instrument, warn};

use crate::config::{AcquisitionConfig, SynopticConfig};
use crate::error::{AcquisitionError, Result};
use crate::remote::{CatalogError, HttpFileTransfer};
use crate::store::{PartialFile, PathLocks};

/// Coordinate unit forced onto every synoptic map.
pub const SYNOPTIC_UNIT: &str = "arcsec";

/// Which rotation to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynopticRequest {
    /// The rotation covering this time (rotation count rounded up).
    Time(DateTime<Utc>),
    /// A Carrington rotation number.
    Rotation(u32),
}

impl SynopticRequest {
    /// Rotation number and representative time.
    ///
    /// For an explicit rotation the time is the start of that rotation.
    pub fn resolve(&self) -> SolarResult<(u32, DateTime<Utc>)> {
        match *self {
            SynopticRequest::Time(t) => Ok((synoptic_rotation(&t)?, t)),
            SynopticRequest::Rotation(n) => Ok((n, carrington_rotation_time(n as f64)?)),
        }
    }
}

/// A loaded synoptic map.
#[derive(Debug, Clone)]
pub struct SynopticMapRecord {
    pub rotation_number: u32,
    pub wavelength: u16,
    pub time: DateTime<Utc>,
    pub local_path: PathBuf,
    pub raw_image: RawImage,
}

impl SynopticMapRecord {
    pub fn description(&self) -> String {
        format!(
            "Synoptic map of Carrington rotation {} seen through {}Å.",
            self.rotation_number, self.wavelength
        )
    }
}

/// Remote URL of a synoptic map.
pub fn synoptic_url(base_url: &str, wavelength: u16, rotation: u32) -> String {
    format!(
        "{}/AIA{:04}/CR{:04}.fits",
        base_url.trim_end_matches('/'),
        wavelength,
        rotation
    )
}

/// Local file name of a synoptic map.
pub fn synoptic_file_name(wavelength: u16, rotation: u32) -> String {
    format!("AIA0{:04}_CR{:04}.fits", wavelength, rotation)
}

/// Force both coordinate units to arcsec. Idempotent.
pub fn repair_units(header: &mut Header) {
    header.set("CUNIT1", SYNOPTIC_UNIT);
    header.set("CUNIT2", SYNOPTIC_UNIT);
}

/// Downloads and loads synoptic maps.
#[derive(Debug, Clone)]
pub struct SynopticMapFetcher {
    config: SynopticConfig,
    transfer: HttpFileTransfer,
    timeout: Duration,
    locks: PathLocks,
}

impl SynopticMapFetcher {
    pub fn new(config: SynopticConfig, transfer: HttpFileTransfer, timeout: Duration) -> Self {
        Self {
            config,
            transfer,
            timeout,
            locks: PathLocks::new(),
        }
    }

    /// Fetcher using the synoptic section and timeouts of `config`.
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self> {
        config.validate().map_err(AcquisitionError::InvalidConfig)?;
        let transfer = HttpFileTransfer::new(config.request_timeout(), config.connect_timeout())
            .map_err(|e| AcquisitionError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(
            config.synoptic.clone(),
            transfer,
            config.request_timeout(),
        ))
    }

    pub fn local_path(&self, wavelength: u16, rotation: u32) -> PathBuf {
        self.config
            .data_dir
            .join(synoptic_file_name(wavelength, rotation))
    }

    pub fn url(&self, wavelength: u16, rotation: u32) -> String {
        synoptic_url(&self.config.base_url, wavelength, rotation)
    }

    /// Load the map for `request`, downloading it if it is not on disk.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        request: SynopticRequest,
        wavelength: u16,
    ) -> Result<SynopticMapRecord> {
        let (rotation_number, time) = request.resolve()?;
        info!(rotation = rotation_number, "Carrington rotation resolved");

        let local_path = self.local_path(wavelength, rotation_number);
        let slot = local_path.to_string_lossy().into_owned();
        let image = {
            let _guard = self.locks.lock(&slot).await;
            if local_path.exists() {
                read_map(local_path.clone()).await?
            } else {
                self.download(wavelength, rotation_number, &local_path)
                    .await?
            }
        };

        let raw_image = into_raw(image, &local_path);
        Ok(SynopticMapRecord {
            rotation_number,
            wavelength,
            time,
            local_path,
            raw_image,
        })
    }

    async fn download(&self, wavelength: u16, rotation: u32, target: &Path) -> Result<FitsImage> {
        let url = self.url(wavelength, rotation);
        info!(url = %url, "Fetching remote synoptic map");

        let result = tokio::time::timeout(self.timeout, self.transfer.get(&url)).await;
        let bytes = match result {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(CatalogError::Status { url, status })) => {
                return Err(AcquisitionError::RemoteFetch { url, status });
            }
            Ok(Err(e)) => {
                return Err(AcquisitionError::Download {
                    url,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(AcquisitionError::Download {
                    url,
                    message: format!("timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        let staged = PartialFile::write(target, &bytes).await?;
        let image = match read_map(staged.path().to_path_buf()).await {
            Ok(image) => image,
            Err(e) => {
                warn!(url = %url, error = %e, "Synoptic download is not FITS");
                staged.discard().await;
                return Err(e);
            }
        };
        staged.commit().await?;
        info!(path = %target.display(), bytes = bytes.len(), "Synoptic map stored");
        Ok(image)
    }
}

async fn read_map(path: PathBuf) -> Result<FitsImage> {
    Ok(tokio::task::spawn_blocking(move || fits_parser::read_fits(path)).await??)
}

/// Repair units and wrap a map read from `path`.
fn into_raw(mut image: FitsImage, path: &Path) -> RawImage {
    repair_units(&mut image.header);
    RawImage::from_fits(image, ImageSource::LocalCache(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_and_file_name() {
        assert_eq!(
            synoptic_url("https://sdo.gsfc.nasa.gov/assets/img/synoptic/", 193, 2286),
            "https://sdo.gsfc.nasa.gov/assets/img/synoptic/AIA0193/CR2286.fits"
        );
        assert_eq!(synoptic_file_name(193, 2286), "AIA00193_CR2286.fits");
        assert_eq!(synoptic_file_name(1600, 2100), "AIA01600_CR2100.fits");
    }

    #[test]
    fn test_rotation_request_uses_rotation_start() {
        let (rotation, time) = SynopticRequest::Rotation(2286).resolve().unwrap();
        assert_eq!(rotation, 2286);
        assert_eq!(time, carrington_rotation_time(2286.0).unwrap());
        assert_eq!(SynopticRequest::Time(time).resolve().unwrap().0, 2286);
    }

    #[test]
    fn test_time_request_rounds_up() {
        let t = carrington_rotation_time(2285.1).unwrap();
        let (rotation, time) = SynopticRequest::Time(t).resolve().unwrap();
        assert_eq!(rotation, 2286);
        assert_eq!(time, t);
    }

    #[test]
    fn test_repair_units_is_idempotent() {
        let mut header = Header::new();
        header.set("CUNIT1", "deg");
        repair_units(&mut header);
        let once = header.clone();
        repair_units(&mut header);
        assert_eq!(header.get_str("CUNIT1"), Some("arcsec"));
        assert_eq!(header.get_str("CUNIT2"), Some("arcsec"));
        assert_eq!(header, once);
    }

    #[test]
    fn test_local_path_under_data_dir() {
        let config = SynopticConfig {
            base_url: "http://localhost/synoptic".to_string(),
            data_dir: PathBuf::from("/home/user/sunpy/data/synoptic"),
        };
        let transfer =
            HttpFileTransfer::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        let fetcher = SynopticMapFetcher::new(config, transfer, Duration::from_secs(5));
        assert_eq!(
            fetcher.local_path(171, 2157),
            PathBuf::from("/home/user/sunpy/data/synoptic/AIA00171_CR2157.fits")
        );
        assert_eq!(
            fetcher.url(171, 2157),
            "http://localhost/synoptic/AIA0171/CR2157.fits"
        );
    }
}
