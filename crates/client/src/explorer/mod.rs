//! Block explorer API client.
//!
//! Implements [`RecordSource`] over a blockchain.info-compatible HTTP API.
//!
//! ### Endpoints
//!
//! - **Tip**: `GET {base}/latestblock` → `{"height": ..}`
//! - **Block**: `GET {base}/block-height/{h}?format=json` → `{"blocks": [..]}`
//!
//! ### Error mapping
//!
//! - 404 or no block at the height → `NotFound`
//! - Timeout, connection failure, other non-2xx, undecodable body → `UpstreamUnavailable`
//!
//! Every request carries the timeout from [`ExplorerConfig`].

pub mod error;
pub mod response;

pub use error::ExplorerError;
pub use response::{BlockHeightResponse, LatestBlock, RawBlock};

use async_trait::async_trait;
use blockcache_core::{AppConfig, BlockSummary, Error, RecordSource};
use reqwest::{StatusCode, header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Default base URL.
const DEFAULT_BASE_URL: &str = "https://blockchain.info";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "blockcache/0.1";

/// Explorer client configuration.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Base URL (default: https://blockchain.info).
    pub base_url: String,
    /// Request timeout (default: 30s).
    pub timeout: Duration,
    /// User-agent string (default: blockcache/0.x).
    pub user_agent: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&AppConfig> for ExplorerConfig {
    fn from(config: &AppConfig) -> Self {
        Self { base_url: config.explorer_url.clone(), timeout: config.timeout(), user_agent: config.user_agent.clone() }
    }
}

/// Block explorer API client.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: Url,
    config: ExplorerConfig,
}

impl ExplorerClient {
    /// Create a new explorer client with the given configuration.
    pub fn new(config: ExplorerConfig) -> Result<Self, ExplorerError> {
        let mut base_url =
            Url::parse(&config.base_url).map_err(|e| ExplorerError::InvalidBaseUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ExplorerError::InvalidBaseUrl(config.base_url.clone()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .build()
            .map_err(|e| ExplorerError::Network(Arc::new(e)))?;

        Ok(Self { http, base_url, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Query the height of the current tip.
    pub async fn latest_block(&self) -> Result<LatestBlock, ExplorerError> {
        let url = self.endpoint("latestblock")?;
        self.get_json(url, "latest block").await
    }

    /// Fetch the full block at `height`.
    pub async fn block_at(&self, height: u64) -> Result<RawBlock, ExplorerError> {
        let mut url = self.endpoint(&format!("block-height/{height}"))?;
        url.set_query(Some("format=json"));

        let what = format!("block at height {height}");
        let response: BlockHeightResponse = self.get_json(url, &what).await?;
        response.into_block(height).ok_or(ExplorerError::NotFound(what))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ExplorerError> {
        self.base_url
            .join(path)
            .map_err(|e| ExplorerError::InvalidBaseUrl(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, ExplorerError> {
        let start = Instant::now();
        tracing::debug!(%url, "explorer request");

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExplorerError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(ExplorerError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        tracing::debug!(what, elapsed = ?start.elapsed(), bytes = bytes.len(), "explorer response");

        serde_json::from_slice(&bytes).map_err(|e| ExplorerError::Parse(format!("{what}: {e}")))
    }
}

#[async_trait]
impl RecordSource for ExplorerClient {
    async fn tip_height(&self) -> Result<u64, Error> {
        let latest = self.latest_block().await?;
        tracing::debug!(height = latest.height, "current tip");
        Ok(latest.height)
    }

    async fn fetch_block(&self, height: u64) -> Result<BlockSummary, Error> {
        let block = self.block_at(height).await?;
        Ok(block.summary())
    }
}
