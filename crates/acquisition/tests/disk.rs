//! Cache-first acquisition of single disk images.

mod common;

use std::sync::Arc;
use std::time::Duration;

use acquisition::{
    AcquisitionError, CatalogClient, CatalogError, CatalogQuery, CatalogRecord, HttpFileTransfer,
    SolarDisk,
};
use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use calibration::{CalibrationStage, ImageSource, StageName};
use common::{config_in, file_names, init_tracing, record_for, spawn_server, MockCatalog};
use solar_common::MetadataKey;
use test_utils::AiaFixture;

fn key(fixture: &AiaFixture, resolution: u32) -> MetadataKey {
    MetadataKey::new(fixture.time, fixture.wavelength, resolution).unwrap()
}

#[tokio::test]
async fn test_cache_hit_skips_catalog() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let cached = fixture.write_to(dir.path()).unwrap();

    let catalog = Arc::new(MockCatalog::new());
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let result = disk.acquire(key(&fixture, 64), false).await.unwrap();

    assert_eq!(catalog.queries(), 0);
    assert_eq!(result.raw.source(), &ImageSource::LocalCache(cached));
    assert_eq!(result.normalized.stage(), CalibrationStage::Normalized);
    assert!(result.deconvolved.is_none());

    let header = result.normalized.header();
    assert!(header.get_f64("CDELT2").is_some());
    assert!(header.get_f64("RSUN_OBS").is_some());
    assert_eq!(result.geometry.pixel_radius, 25);
    assert_eq!(
        result.description(),
        "Solar disk during 2015-03-11 00:00:00 seen through 171Å, observed at 64 px."
    );
}

#[tokio::test]
async fn test_cache_miss_downloads_into_cache() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default().with_wavelength(193);
    let catalog = Arc::new(MockCatalog::new().with_fixture(fixture.clone()));
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let first = disk.acquire(key(&fixture, 128), false).await.unwrap();
    assert_eq!(catalog.fetches(), 1);
    assert!(matches!(first.raw.source(), ImageSource::Remote(id) if id.contains("[193]")));
    assert_eq!(first.normalized.grid().width, 128);
    assert_eq!(first.geometry.pixel_radius, 50);
    assert_eq!(file_names(dir.path()), vec![fixture.cache_file_name()]);

    // The stored file satisfies the next lookup, at any resolution.
    let second = disk.acquire(key(&fixture, 64), false).await.unwrap();
    assert_eq!(catalog.fetches(), 1);
    assert!(matches!(second.raw.source(), ImageSource::LocalCache(_)));
}

#[tokio::test]
async fn test_cached_file_from_another_day_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    fixture
        .clone()
        .with_time(fixture.time - chrono::Duration::days(1))
        .write_to(dir.path())
        .unwrap();
    let catalog = Arc::new(MockCatalog::new());
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::NotFound { .. }));
    assert_eq!(catalog.queries(), 1);
}

#[tokio::test]
async fn test_cached_file_with_wrong_wavelength_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    // A 193 Å observation stored under the 171 Å name.
    let misfiled = fixture.clone().with_wavelength(193).write_to(dir.path()).unwrap();
    std::fs::rename(&misfiled, dir.path().join(fixture.cache_file_name())).unwrap();

    let catalog = Arc::new(MockCatalog::new().with_fixture(fixture.clone()));
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let first = disk.acquire(key(&fixture, 64), false).await.unwrap();
    assert_eq!(catalog.fetches(), 1);
    assert!(matches!(first.raw.source(), ImageSource::Remote(_)));
    assert_eq!(first.raw.header().get_i64("WAVELNTH"), Some(171));

    let second = disk.acquire(key(&fixture, 64), false).await.unwrap();
    assert_eq!(catalog.fetches(), 1);
    assert!(matches!(second.raw.source(), ImageSource::LocalCache(_)));
}

#[tokio::test]
async fn test_cached_file_observed_on_another_day_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let next_day = fixture
        .clone()
        .with_time(fixture.time + chrono::Duration::days(1))
        .write_to(dir.path())
        .unwrap();
    std::fs::rename(&next_day, dir.path().join(fixture.cache_file_name())).unwrap();

    let catalog = Arc::new(MockCatalog::new());
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::NotFound { .. }));
    assert_eq!(catalog.queries(), 1);
}

#[tokio::test]
async fn test_unreadable_cache_file_error_carries_key() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    std::fs::write(dir.path().join(fixture.cache_file_name()), b"not a FITS file").unwrap();
    let disk = SolarDisk::new(config_in(dir.path()), Arc::new(MockCatalog::new())).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::Load { .. }), "{err}");
    assert_eq!(err.key(), Some(&key(&fixture, 64)));
}

#[tokio::test]
async fn test_non_fits_download_is_not_cached() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let catalog = Arc::new(
        MockCatalog::new()
            .with_fixture(fixture.clone())
            .with_garbage_fetches(1),
    );
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::Load { .. }), "{err}");
    assert_eq!(err.key(), Some(&key(&fixture, 64)));
    assert!(file_names(dir.path()).is_empty());
    assert!(disk.cache().find(&key(&fixture, 64)).is_none());

    // The next attempt goes back to the catalog and succeeds.
    let result = disk.acquire(key(&fixture, 64), false).await.unwrap();
    assert_eq!(catalog.fetches(), 2);
    assert!(matches!(result.raw.source(), ImageSource::Remote(_)));
    assert_eq!(file_names(dir.path()), vec![fixture.cache_file_name()]);
}

#[tokio::test]
async fn test_empty_catalog_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let disk = SolarDisk::new(config_in(dir.path()), Arc::new(MockCatalog::new())).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::NotFound { .. }));
    assert_eq!(err.key(), Some(&key(&fixture, 64)));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_fetch_failure_is_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let catalog = MockCatalog::new().with_fixture(fixture.clone()).failing();
    let disk = SolarDisk::new(config_in(dir.path()), Arc::new(catalog)).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    match err {
        AcquisitionError::Transport { message, .. } => {
            assert!(message.contains("connection reset"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_slow_download_times_out_without_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let catalog = MockCatalog::new()
        .with_fixture(fixture.clone())
        .with_fetch_delay(Duration::from_secs(3));
    let config = acquisition::AcquisitionConfig {
        request_timeout_secs: 1,
        ..config_in(dir.path())
    };
    let disk = SolarDisk::new(config, Arc::new(catalog)).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    assert!(matches!(err, AcquisitionError::Transport { .. }));
    assert!(disk.cache().find(&key(&fixture, 64)).is_none());
}

#[tokio::test]
async fn test_cancelled_acquisition_leaves_no_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default();
    let catalog = MockCatalog::new()
        .with_fixture(fixture.clone())
        .with_fetch_delay(Duration::from_secs(5));
    let disk = SolarDisk::new(config_in(dir.path()), Arc::new(catalog)).unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_millis(100), disk.acquire(key(&fixture, 64), false))
            .await;
    assert!(cancelled.is_err());
    assert!(disk.cache().find(&key(&fixture, 64)).is_none());
    assert!(file_names(dir.path())
        .iter()
        .all(|name| !name.ends_with(".fits")));
}

#[tokio::test]
async fn test_concurrent_acquisitions_download_once() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default().with_wavelength(211);
    let catalog = Arc::new(
        MockCatalog::new()
            .with_fixture(fixture.clone())
            .with_fetch_delay(Duration::from_millis(50)),
    );
    let disk = SolarDisk::new(config_in(dir.path()), catalog.clone()).unwrap();

    let (a, b) = tokio::join!(
        disk.acquire(key(&fixture, 64), false),
        disk.acquire(key(&fixture, 128), false),
    );
    assert_eq!(a.unwrap().normalized.grid().width, 64);
    assert_eq!(b.unwrap().normalized.grid().width, 128);
    assert_eq!(catalog.fetches(), 1);
    assert_eq!(file_names(dir.path()), vec![fixture.cache_file_name()]);
}

#[tokio::test]
async fn test_calibration_failure_carries_key_and_stage() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture {
        exptime: 0.0,
        ..AiaFixture::default()
    };
    fixture.write_to(dir.path()).unwrap();
    let disk = SolarDisk::new(config_in(dir.path()), Arc::new(MockCatalog::new())).unwrap();

    let err = disk.acquire(key(&fixture, 64), false).await.unwrap_err();
    match err {
        AcquisitionError::Calibration { key: k, source } => {
            assert_eq!(k, key(&fixture, 64));
            assert_eq!(source.stage, StageName::Exposure);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_deconvolution_is_kept_in_result() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = AiaFixture::default().with_wavelength(304);
    fixture.write_to(dir.path()).unwrap();
    let mut config = config_in(dir.path());
    config.calibration.psf_iterations = 3;
    let disk = SolarDisk::new(config, Arc::new(MockCatalog::new())).unwrap();

    let result = disk.acquire(key(&fixture, 64), true).await.unwrap();
    let deconvolved = result.deconvolved.as_ref().unwrap();
    assert_eq!(deconvolved.stage(), CalibrationStage::Deconvolved);
    assert_eq!(deconvolved.header().get_i64("PSFITER"), Some(3));
    assert_eq!(result.normalized.stage(), CalibrationStage::Normalized);
}

/// Catalog whose records point at an HTTP server.
struct HttpCatalog {
    transfer: HttpFileTransfer,
    record: CatalogRecord,
}

#[async_trait]
impl CatalogClient for HttpCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<Vec<CatalogRecord>>, CatalogError> {
        if query.range().contains(&self.record.time) && query.wavelength == self.record.wavelength
        {
            Ok(vec![vec![self.record.clone()]])
        } else {
            Ok(Vec::new())
        }
    }

    async fn fetch(&self, record: &CatalogRecord) -> Result<Bytes, CatalogError> {
        self.transfer.get_record(record).await
    }
}

#[tokio::test]
async fn test_http_catalog_download() {
    init_tracing();
    let fixture = AiaFixture::default().with_wavelength(335);
    let body = Bytes::from(fixture.fits_bytes().unwrap());
    let app = Router::new().route("/lev1/image.fits", get(move || async move { body }));
    let addr = spawn_server(app).await;

    let record = CatalogRecord {
        url: Some(format!("http://{}/lev1/image.fits", addr)),
        ..record_for(&fixture)
    };
    let catalog = HttpCatalog {
        transfer: HttpFileTransfer::new(Duration::from_secs(10), Duration::from_secs(5)).unwrap(),
        record,
    };

    let dir = tempfile::tempdir().unwrap();
    let disk = SolarDisk::new(config_in(dir.path()), Arc::new(catalog)).unwrap();
    let result = disk.acquire(key(&fixture, 64), false).await.unwrap();

    assert_eq!(result.geometry.pixel_radius, 25);
    assert!(dir.path().join(fixture.cache_file_name()).is_file());
}
