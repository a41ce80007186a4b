//! Fetching metadata and tile payloads
//!
//! The cache talks to a [`TileFetcher`] so hosts and tests can supply their own
//! transport. [`HttpTileFetcher`] is the default, backed by one shared reqwest
//! client.

use super::source::TileSource;
use super::types::TileId;
use crate::data::geojson::GeoJson;
use crate::grid::metadata::GridMetadata;
use crate::prelude::{Arc, Duration};
use crate::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;

/// Shared async HTTP client for metadata and tile requests
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("tilegrid/0.1.0")
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

#[async_trait]
pub trait TileFetcher: Send + Sync + 'static {
    async fn fetch_metadata(&self) -> Result<GridMetadata>;

    async fn fetch_tile(&self, id: &TileId) -> Result<GeoJson>;
}

pub struct HttpTileFetcher {
    client: reqwest::Client,
    source: Arc<dyn TileSource>,
    request_timeout: Duration,
}

impl HttpTileFetcher {
    pub fn new(source: Arc<dyn TileSource>, request_timeout: Duration) -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            source,
            request_timeout,
        }
    }

    pub fn source(&self) -> &dyn TileSource {
        self.source.as_ref()
    }

    async fn get_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch_metadata(&self) -> Result<GridMetadata> {
        let url = self.source.metadata_url();
        log::debug!("fetching grid metadata from {}", url);

        let bytes = self
            .get_bytes(&url)
            .await
            .map_err(|reason| Error::MetadataLoad { reason })?;
        GridMetadata::from_slice(&bytes).map_err(|e| Error::MetadataLoad {
            reason: e.to_string(),
        })
    }

    async fn fetch_tile(&self, id: &TileId) -> Result<GeoJson> {
        let url = self.source.tile_url(id);
        log::debug!("fetching tile {} from {}", id, url);

        let bytes = self.get_bytes(&url).await.map_err(|reason| Error::TileFetch {
            id: id.clone(),
            reason,
        })?;
        let data = GeoJson::from_slice(&bytes).map_err(|e| Error::TileFetch {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        log::debug!("tile {} parsed ({} bytes)", id, bytes.len());
        Ok(data)
    }
}
