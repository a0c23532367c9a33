//! Shared helpers for acquisition integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use acquisition::{AcquisitionConfig, CatalogClient, CatalogError, CatalogQuery, CatalogRecord};
use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use test_utils::AiaFixture;

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration rooted in a temporary directory.
pub fn config_in(dir: &Path) -> AcquisitionConfig {
    AcquisitionConfig {
        storage_root: dir.to_path_buf(),
        use_accelerated: false,
        ..Default::default()
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Catalog record the mock lists for a fixture.
pub fn record_for(fixture: &AiaFixture) -> CatalogRecord {
    CatalogRecord {
        id: format!("aia.lev1_euv_12s[{}][{}]", fixture.t_obs(), fixture.wavelength),
        time: fixture.time,
        wavelength: fixture.wavelength,
        url: None,
    }
}

/// In-memory catalog holding one observation per wavelength.
#[derive(Default)]
pub struct MockCatalog {
    fixtures: HashMap<u16, AiaFixture>,
    fetch_delay: Duration,
    fail_fetch: bool,
    garbage_fetches: AtomicUsize,
    pub queries: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(mut self, fixture: AiaFixture) -> Self {
        self.fixtures.insert(fixture.wavelength, fixture);
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Answer the first `count` fetches with a 200-style HTML error page.
    pub fn with_garbage_fetches(self, count: usize) -> Self {
        self.garbage_fetches.store(count, Ordering::SeqCst);
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<Vec<CatalogRecord>>, CatalogError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(match self.fixtures.get(&query.wavelength) {
            Some(fixture) if query.range().contains(&fixture.time) => {
                vec![vec![record_for(fixture)]]
            }
            _ => Vec::new(),
        })
    }

    async fn fetch(&self, record: &CatalogRecord) -> Result<Bytes, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.fetch_delay).await;
        if self.fail_fetch {
            return Err(CatalogError::Request("connection reset by peer".to_string()));
        }
        let garbage = self
            .garbage_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if garbage {
            return Ok(Bytes::from_static(b"<html>proxy error</html>"));
        }
        let fixture = self
            .fixtures
            .get(&record.wavelength)
            .ok_or_else(|| CatalogError::Request(format!("unknown record {}", record.id)))?;
        fixture
            .fits_bytes()
            .map(Bytes::from)
            .map_err(|e| CatalogError::Request(e.to_string()))
    }
}

/// Names of the files directly under `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
