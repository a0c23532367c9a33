//! Local level-1 cache lookup.
//!
//! The cache is keyed by date and wavelength only. Files are named the way
//! the JSOC export names them:
//!
//! ```text
//! <root>/aia_lev1_<wl>a_<YYYY_MM_DD>t<HH_MM_SS_cc>z_image_lev1.fits
//! ```
//!
//! so a lookup globs `aia_lev1_<wl>a_<YYYY_MM_DD>*.fits`. A name is only a
//! claim: once a candidate is read, [`check_suitable`] compares its
//! `WAVELNTH` and observation date against the key and a mismatch counts as
//! a miss. Resolution is not part of the name; whatever is found gets
//! resampled by registration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use fits_parser::Header;
use glob::Pattern;
use solar_common::{parse_time, Instrument, MetadataKey};
use thiserror::Error;
use tracing::debug;

/// Why a cached file cannot stand in for the requested observation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheMismatch {
    #[error("WAVELNTH is {found:?}, expected {expected}")]
    Wavelength { expected: u16, found: Option<f64> },

    #[error("observed on {found:?}, expected {expected}")]
    Date {
        expected: NaiveDate,
        found: Option<String>,
    },
}

/// Finds previously downloaded images under a storage root.
#[derive(Debug, Clone)]
pub struct CacheResolver {
    root: PathBuf,
    instrument: Instrument,
}

impl CacheResolver {
    pub fn new(root: impl Into<PathBuf>, instrument: Instrument) -> Self {
        Self {
            root: root.into(),
            instrument,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Glob pattern for `key`, with the storage root escaped.
    pub fn pattern(&self, key: &MetadataKey) -> String {
        let root = Pattern::escape(&self.root.to_string_lossy());
        format!(
            "{}/{}_lev1_{}a_{}*.fits",
            root.trim_end_matches('/'),
            self.instrument.file_prefix(),
            key.wavelength,
            key.cache_date()
        )
    }

    /// Cached files whose names match the key's date and wavelength, in
    /// glob order.
    ///
    /// Empty when nothing matches or the root does not exist. Entries that
    /// cannot be read while listing are skipped.
    pub fn candidates(&self, key: &MetadataKey) -> Vec<PathBuf> {
        let pattern = self.pattern(key);
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "Invalid cache pattern");
                return Vec::new();
            }
        };

        let found: Vec<PathBuf> = paths
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        debug!(pattern = %pattern, found = found.len(), "Cache lookup");
        found
    }

    /// First cached file for the key's date and wavelength.
    pub fn find(&self, key: &MetadataKey) -> Option<PathBuf> {
        self.candidates(key).into_iter().next()
    }

    /// Path a download for this observation is stored under.
    pub fn target_path(&self, observed: &DateTime<Utc>, wavelength: u16) -> PathBuf {
        self.root
            .join(cache_file_name(self.instrument, observed, wavelength))
    }
}

/// Check that a cached image really is the key's wavelength and day.
///
/// The date comes from `T_OBS`, falling back to `DATE-OBS`.
pub fn check_suitable(key: &MetadataKey, header: &Header) -> Result<(), CacheMismatch> {
    let wavelength = header.get_f64("WAVELNTH");
    if wavelength != Some(f64::from(key.wavelength)) {
        return Err(CacheMismatch::Wavelength {
            expected: key.wavelength,
            found: wavelength,
        });
    }

    let expected = key.time.date_naive();
    let observed = header.get_str("T_OBS").or_else(|| header.get_str("DATE-OBS"));
    match observed.map(parse_time) {
        Some(Ok(t)) if t.date_naive() == expected => Ok(()),
        _ => Err(CacheMismatch::Date {
            expected,
            found: observed.map(str::to_string),
        }),
    }
}

/// File name for a downloaded level-1 image.
///
/// Matches the pattern [`CacheResolver::find`] searches, so a later lookup
/// for the same date and wavelength hits.
pub fn cache_file_name(instrument: Instrument, observed: &DateTime<Utc>, wavelength: u16) -> String {
    format!(
        "{}_lev1_{}a_{}_{:02}z_image_lev1.fits",
        instrument.file_prefix(),
        wavelength,
        observed.format("%Y_%m_%dt%H_%M_%S"),
        observed.timestamp_subsec_millis() / 10
    )
}
