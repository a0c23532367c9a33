//! Acquisition configuration.
//!
//! Defaults suit a workstation with a `~/sunpy/data` cache. Every field can
//! be overridden from a YAML file or, for the common knobs, from the
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calibration::CalibrationConfig;
use serde::{Deserialize, Serialize};
use solar_common::Instrument;

use crate::error::{AcquisitionError, Result};

/// Longest catalog query window accepted, seconds (one day).
pub const MAX_QUERY_WINDOW_SECS: u64 = 86_400;

/// Where synoptic maps come from and where they are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynopticConfig {
    /// Base URL; `AIA{wl:04}/CR{rot:04}.fits` is appended.
    pub base_url: String,

    /// Local directory for downloaded maps.
    pub data_dir: PathBuf,
}

impl Default for SynopticConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sdo.gsfc.nasa.gov/assets/img/synoptic".to_string(),
            data_dir: home_dir().join("sunpy").join("data").join("synoptic"),
        }
    }
}

/// Configuration for disk acquisition and the dataset registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Local level-1 cache, searched before the catalog.
    pub storage_root: PathBuf,

    pub instrument: Instrument,

    /// Catalog query window starting at the observation time, seconds.
    pub query_window_secs: u64,

    /// Timeout for one catalog query or download, seconds.
    pub request_timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// Registry acquisitions running at once.
    pub max_concurrent: usize,

    /// Prefer the data-parallel deconvolution backend.
    pub use_accelerated: bool,

    pub calibration: CalibrationConfig,

    pub synoptic: SynopticConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            storage_root: home_dir().join("sunpy").join("data"),
            instrument: Instrument::Aia,
            query_window_secs: 60,
            request_timeout_secs: 600, // 10 minutes
            connect_timeout_secs: 30,
            max_concurrent: 4,
            use_accelerated: true,
            calibration: CalibrationConfig::default(),
            synoptic: SynopticConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            calibration: CalibrationConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("SDO_STORAGE_ROOT") {
            config.storage_root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("SDO_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("SDO_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                config.max_concurrent = n;
            }
        }

        if let Ok(val) = std::env::var("SDO_USE_ACCELERATED") {
            config.use_accelerated = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(val) = std::env::var("SDO_SYNOPTIC_URL") {
            config.synoptic.base_url = val;
        }

        if let Ok(val) = std::env::var("SDO_SYNOPTIC_DIR") {
            config.synoptic.data_dir = PathBuf::from(val);
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| AcquisitionError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(AcquisitionError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.query_window_secs == 0 || self.query_window_secs > MAX_QUERY_WINDOW_SECS {
            return Err(format!(
                "query_window_secs must be in 1..={}, got {}",
                MAX_QUERY_WINDOW_SECS, self.query_window_secs
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs must be > 0".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be > 0".to_string());
        }
        if self.synoptic.base_url.is_empty() {
            return Err("synoptic.base_url must not be empty".to_string());
        }
        self.calibration.validate()
    }

    /// Catalog query window. Bounded by [`validate`](Self::validate).
    pub fn query_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.query_window_secs.min(MAX_QUERY_WINDOW_SECS) as i64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibration::InterpolationMethod;

    #[test]
    fn test_default_is_valid() {
        let config = AcquisitionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query_window_secs, 60);
        assert_eq!(config.max_concurrent, 4);
        assert!(config.storage_root.ends_with("sunpy/data"));
        assert!(config.synoptic.data_dir.ends_with("sunpy/data/synoptic"));
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
storage_root: /data/aia
max_concurrent: 2
calibration:
  interpolation: nearest
synoptic:
  base_url: http://localhost:9000/synoptic
"#;
        let config = AcquisitionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/data/aia"));
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.query_window_secs, 60);
        assert_eq!(
            config.calibration.interpolation,
            InterpolationMethod::Nearest
        );
        assert_eq!(config.synoptic.base_url, "http://localhost:9000/synoptic");
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let err = AcquisitionConfig::from_yaml_str("max_concurrent: 0").unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidConfig(_)));

        let err = AcquisitionConfig::from_yaml_str("max_concurrent: [").unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidConfig(_)));
    }

    #[test]
    fn test_query_window_is_bounded() {
        let err = AcquisitionConfig::from_yaml_str("query_window_secs: 18446744073709551615")
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidConfig(msg) if msg.contains("query_window_secs")));

        let config = AcquisitionConfig::from_yaml_str("query_window_secs: 86400").unwrap();
        assert_eq!(config.query_window(), chrono::Duration::days(1));
    }

    #[test]
    fn test_timeouts() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(600));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }
}
