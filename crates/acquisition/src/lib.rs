//! Acquisition of calibrated SDO/AIA solar disk images and synoptic maps.
//!
//! - [`CacheResolver`]: local level-1 cache lookup by date and wavelength
//! - [`CatalogClient`]: the remote catalog boundary, plus [`HttpFileTransfer`]
//! - [`SolarDisk`]: cache-first acquisition through calibration to [`DiskGeometry`]
//! - [`DatasetRegistry`]: every wavelength × resolution pair for one time
//! - [`SynopticMapFetcher`]: Carrington-rotation synoptic maps
//!
//! [`DiskGeometry`]: calibration::DiskGeometry

pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod registry;
pub mod remote;
pub mod store;
pub mod synoptic;

pub use cache::{cache_file_name, check_suitable, CacheMismatch, CacheResolver};
pub use config::{AcquisitionConfig, SynopticConfig};
pub use disk::{AcquisitionResult, SolarDisk};
pub use error::{AcquisitionError, LoadError, Result};
pub use registry::{DatasetRegistry, RegistryFailure, RegistryPolicy};
pub use remote::{CatalogClient, CatalogError, CatalogQuery, CatalogRecord, HttpFileTransfer};
pub use store::{write_atomic, PartialFile, PathLocks};
pub use synoptic::{
    repair_units, synoptic_file_name, synoptic_url, SynopticMapFetcher, SynopticMapRecord,
    SynopticRequest,
};
