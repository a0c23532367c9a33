//! Acquisition of one calibrated solar disk image.
//!
//! The local cache is tried first; a cached file counts only if its header
//! agrees with the requested day and wavelength. On a miss the catalog is
//! queried for the window starting at the observation time and the first
//! record of the first group is downloaded. A download enters the cache
//! only after it has been read back as FITS. The raw image is then
//! optionally deconvolved, run through the calibration pipeline and
//! measured.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use calibration::{
    extract, CalibratedImage, CalibrationPipeline, Deconvolved, DiskGeometry, ImageSource,
    Normalized, RawImage,
};
use fits_parser::FitsImage;
use solar_common::{MetadataKey, TimeRange};
use tracing::{debug, info, instrument, warn};

use crate::cache::{check_suitable, CacheResolver};
use crate::config::AcquisitionConfig;
use crate::error::{AcquisitionError, LoadError, Result};
use crate::remote::{CatalogClient, CatalogQuery, CatalogRecord};
use crate::store::{PartialFile, PathLocks};

/// Everything produced by one acquisition. Owned by the caller.
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    pub key: MetadataKey,
    pub raw: RawImage,
    /// Present when deconvolution was requested.
    pub deconvolved: Option<CalibratedImage<Deconvolved>>,
    pub normalized: CalibratedImage<Normalized>,
    pub geometry: DiskGeometry,
}

impl AcquisitionResult {
    /// One-line human description.
    pub fn description(&self) -> String {
        format!(
            "Solar disk during {} seen through {}Å, observed at {} px.",
            self.key.time.format("%Y-%m-%d %H:%M:%S"),
            self.key.wavelength,
            self.key.resolution
        )
    }

    pub fn pixel_radius(&self) -> u32 {
        self.geometry.pixel_radius
    }
}

/// Cache-first acquirer of calibrated disk images.
///
/// Cheap to share: acquisitions take `&self` and may run concurrently. Cache
/// writes for the same date and wavelength are serialized.
pub struct SolarDisk {
    config: AcquisitionConfig,
    cache: CacheResolver,
    catalog: Arc<dyn CatalogClient>,
    pipeline: Arc<CalibrationPipeline>,
    locks: PathLocks,
}

impl std::fmt::Debug for SolarDisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolarDisk")
            .field("storage_root", &self.cache.root())
            .field("instrument", &self.config.instrument)
            .finish()
    }
}

impl SolarDisk {
    /// Build an acquirer, loading the calibration tables named in `config`.
    pub fn new(config: AcquisitionConfig, catalog: Arc<dyn CatalogClient>) -> Result<Self> {
        let pipeline = CalibrationPipeline::new(&config.calibration)?;
        Self::with_pipeline(config, catalog, pipeline)
    }

    /// Build an acquirer around an already loaded pipeline.
    pub fn with_pipeline(
        config: AcquisitionConfig,
        catalog: Arc<dyn CatalogClient>,
        pipeline: CalibrationPipeline,
    ) -> Result<Self> {
        config.validate().map_err(AcquisitionError::InvalidConfig)?;
        let cache = CacheResolver::new(config.storage_root.clone(), config.instrument);
        Ok(Self {
            config,
            cache,
            catalog,
            pipeline: Arc::new(pipeline),
            locks: PathLocks::new(),
        })
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheResolver {
        &self.cache
    }

    /// Acquire, calibrate and measure one image.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn acquire(
        &self,
        key: MetadataKey,
        apply_deconvolution: bool,
    ) -> Result<AcquisitionResult> {
        let raw = self.load_raw(&key).await?;

        let pipeline = Arc::clone(&self.pipeline);
        let use_accelerated = self.config.use_accelerated;
        let (raw, output) = tokio::task::spawn_blocking(move || {
            let output = pipeline.calibrate(
                &raw,
                key.wavelength,
                key.resolution,
                apply_deconvolution,
                use_accelerated,
            );
            (raw, output)
        })
        .await
        .map_err(|source| AcquisitionError::Worker { key, source })?;
        let output = output.map_err(|source| AcquisitionError::Calibration { key, source })?;

        let geometry = extract(&output.normalized)
            .map_err(|source| AcquisitionError::MissingGeometryFields { key, source })?;

        info!(
            pixel_radius = geometry.pixel_radius,
            angular_scale = geometry.angular_scale,
            deconvolved = output.deconvolved.is_some(),
            "Acquisition complete"
        );

        Ok(AcquisitionResult {
            key,
            raw,
            deconvolved: output.deconvolved,
            normalized: output.normalized,
            geometry,
        })
    }

    /// The raw level-1 image for `key`, from the cache or the catalog.
    pub async fn load_raw(&self, key: &MetadataKey) -> Result<RawImage> {
        if let Some(raw) = self.load_cached(key).await? {
            return Ok(raw);
        }

        // Another acquisition of the same date and wavelength may be
        // downloading; wait for it and look again.
        let _guard = self.locks.lock(&self.cache.pattern(key)).await;
        if let Some(raw) = self.load_cached(key).await? {
            debug!("Cache filled while waiting");
            return Ok(raw);
        }

        info!("Cache miss, querying catalog");
        self.fetch_remote(key).await
    }

    /// First cached file that really holds the key's day and wavelength.
    async fn load_cached(&self, key: &MetadataKey) -> Result<Option<RawImage>> {
        for path in self.cache.candidates(key) {
            let image = read_image(key, &path).await?;
            match check_suitable(key, &image.header) {
                Ok(()) => {
                    info!(path = %path.display(), "Cache hit");
                    return Ok(Some(RawImage::from_fits(image, ImageSource::LocalCache(path))));
                }
                Err(mismatch) => {
                    warn!(path = %path.display(), %mismatch, "Ignoring cached file");
                }
            }
        }
        Ok(None)
    }

    async fn fetch_remote(&self, key: &MetadataKey) -> Result<RawImage> {
        let timeout = self.config.request_timeout();
        let range = TimeRange::starting_at(key.time, self.config.query_window().num_seconds());
        let query = CatalogQuery::new(range, self.config.instrument, key.wavelength);

        let groups = with_timeout(key, timeout, "catalog query", self.catalog.query(&query)).await?;
        let record = first_record(groups).ok_or(AcquisitionError::NotFound { key: *key })?;
        debug!(id = %record.id, time = %record.time, "Catalog record selected");

        let bytes = with_timeout(key, timeout, "download", self.catalog.fetch(&record)).await?;

        let target = self.cache.target_path(&record.time, key.wavelength);
        let staged = PartialFile::write(&target, &bytes)
            .await
            .map_err(|e| load_error(key, e))?;
        let image = match read_image(key, staged.path()).await {
            Ok(image) => image,
            Err(e) => {
                warn!(id = %record.id, bytes = bytes.len(), error = %e, "Download is not a readable image");
                staged.discard().await;
                return Err(e);
            }
        };
        staged.commit().await.map_err(|e| load_error(key, e))?;
        info!(path = %target.display(), bytes = bytes.len(), "Stored download in cache");

        Ok(RawImage::from_fits(image, ImageSource::Remote(record.id)))
    }
}

fn first_record(groups: Vec<Vec<CatalogRecord>>) -> Option<CatalogRecord> {
    groups.into_iter().next()?.into_iter().next()
}

async fn with_timeout<T, E: std::fmt::Display>(
    key: &MetadataKey,
    timeout: Duration,
    what: &str,
    fut: impl std::future::Future<Output = std::result::Result<T, E>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AcquisitionError::Transport {
            key: *key,
            message: format!("{} failed: {}", what, e),
        }),
        Err(_) => Err(AcquisitionError::Transport {
            key: *key,
            message: format!("{} timed out after {}s", what, timeout.as_secs()),
        }),
    }
}

fn load_error(key: &MetadataKey, source: impl Into<LoadError>) -> AcquisitionError {
    AcquisitionError::Load {
        key: *key,
        source: source.into(),
    }
}

async fn read_image(key: &MetadataKey, path: &Path) -> Result<FitsImage> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || fits_parser::read_fits(path))
        .await
        .map_err(|e| load_error(key, e))?
        .map_err(|e| load_error(key, e))
}
