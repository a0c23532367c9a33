//! Remote catalog boundary and HTTP file transfer.
//!
//! The catalog itself is an external service. [`CatalogClient`] is the whole
//! contract acquisition relies on: query a time window, fetch one record.
//! Retries, if any, belong to the client implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solar_common::{Instrument, TimeRange};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Catalog and transfer failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("record {0} has no download URL")]
    NoUrl(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Request(e.to_string())
    }
}

/// A catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub instrument: Instrument,
    /// Channel wavelength in angstrom
    pub wavelength: u16,
}

impl CatalogQuery {
    pub fn new(range: TimeRange, instrument: Instrument, wavelength: u16) -> Self {
        Self {
            start: range.start,
            end: range.end,
            instrument,
            wavelength,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// One observation listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog identifier, kept as the image source.
    pub id: String,
    pub time: DateTime<Utc>,
    pub wavelength: u16,
    /// Direct download location, when the catalog provides one.
    #[serde(default)]
    pub url: Option<String>,
}

/// Remote catalog of level-1 images.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Records in the query window, grouped the way the catalog groups them.
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<Vec<CatalogRecord>>, CatalogError>;

    /// Raw FITS bytes of one record.
    async fn fetch(&self, record: &CatalogRecord) -> Result<Bytes, CatalogError>;
}

/// Plain HTTP GET of whole files.
#[derive(Debug, Clone)]
pub struct HttpFileTransfer {
    client: Client,
}

impl HttpFileTransfer {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client })
    }

    /// Download `url` in full.
    ///
    /// A non-success status is an error and no body is returned.
    #[instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<Bytes, CatalogError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = BytesMut::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }

        info!(bytes = body.len(), "Download completed");
        Ok(body.freeze())
    }

    /// Download the file a record points at.
    pub async fn get_record(&self, record: &CatalogRecord) -> Result<Bytes, CatalogError> {
        let url = record
            .url
            .as_deref()
            .ok_or_else(|| CatalogError::NoUrl(record.id.clone()))?;
        debug!(id = %record.id, url = %url, "Fetching catalog record");
        self.get(url).await
    }
}
