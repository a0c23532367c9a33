//! Acquisition identity.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::is_aia_channel;
use crate::error::{SolarError, SolarResult};

/// Identity of one acquisition: observation time, wavelength channel and
/// output resolution.
///
/// Used for cache lookup, catalog requests and registry indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetadataKey {
    pub time: DateTime<Utc>,
    /// Channel wavelength in angstrom
    pub wavelength: u16,
    /// Output image edge length in pixels
    pub resolution: u32,
}

impl MetadataKey {
    /// Build a key, rejecting non-AIA channels and zero resolutions.
    pub fn new(time: DateTime<Utc>, wavelength: u16, resolution: u32) -> SolarResult<Self> {
        if !is_aia_channel(wavelength) {
            return Err(SolarError::InvalidWavelength(wavelength));
        }
        if resolution == 0 {
            return Err(SolarError::InvalidResolution(resolution));
        }
        Ok(Self {
            time,
            wavelength,
            resolution,
        })
    }

    /// Date component used by the local cache (`YYYY_MM_DD`).
    pub fn cache_date(&self) -> String {
        self.time.format("%Y_%m_%d").to_string()
    }

    /// The same observation at a different resolution.
    pub fn with_resolution(&self, resolution: u32) -> SolarResult<Self> {
        Self::new(self.time, self.wavelength, resolution)
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}A/{}px",
            self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.wavelength,
            self.resolution
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_display() {
        let t = Utc.with_ymd_and_hms(2015, 3, 11, 0, 0, 0).unwrap();
        let key = MetadataKey::new(t, 193, 4096).unwrap();
        assert_eq!(key.to_string(), "2015-03-11T00:00:00Z/193A/4096px");
        assert_eq!(key.cache_date(), "2015_03_11");
    }

    #[test]
    fn test_key_validation() {
        let t = Utc.with_ymd_and_hms(2015, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(
            MetadataKey::new(t, 192, 4096),
            Err(SolarError::InvalidWavelength(192))
        );
        assert_eq!(
            MetadataKey::new(t, 193, 0),
            Err(SolarError::InvalidResolution(0))
        );
    }

    #[test]
    fn test_key_ordering_by_time_first() {
        let t0 = Utc.with_ymd_and_hms(2015, 3, 11, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2015, 3, 12, 0, 0, 0).unwrap();
        let a = MetadataKey::new(t0, 304, 4096).unwrap();
        let b = MetadataKey::new(t1, 94, 512).unwrap();
        assert!(a < b);
    }
}
