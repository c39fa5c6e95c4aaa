//! The injected fetch capability and its reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use atlasbot_shared::{AtlasError, Result};

/// User-Agent string for outgoing requests.
pub const USER_AGENT: &str = concat!("AtlasBot/", env!("CARGO_PKG_VERSION"));

/// Raw retrieval of remote resources. Pure I/O boundary, externally supplied.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL and return its body as text (page markup).
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetch a URL and return its body as raw bytes (images).
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes>;
}

/// Production [`Fetcher`] backed by a shared reqwest client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AtlasError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!(%url, "fetching");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AtlasError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtlasError::Network(format!("{url}: HTTP {status}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| AtlasError::Network(format!("{url}: body read failed: {e}")))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let response = self.get(url).await?;
        response
            .bytes()
            .await
            .map_err(|e| AtlasError::Network(format!("{url}: body read failed: {e}")))
    }
}
