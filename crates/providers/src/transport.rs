//! HTTP transport. The only seam between the client and the network.
//!
//! The transport only moves bytes: it reports the status code and body of a
//! response, or a network-level failure. Classifying those into retryable and
//! fatal outcomes is the executor's job.

use async_trait::async_trait;
use colloquy_core::error::ProviderError;
use std::time::Duration;
use tracing::trace;

/// Status and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: &serde_json::Value) -> Self {
        Self::new(200, body.to_string())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `path`, relative to the service base URL.
    async fn get(&self, path: &str) -> Result<HttpReply, ProviderError>;

    /// POST a JSON body to `path`, relative to the service base URL.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<HttpReply, ProviderError>;
}

/// `reqwest`-backed transport with bearer authentication.
pub struct HttpTransport {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn finish(response: reqwest::Response) -> Result<HttpReply, ProviderError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        trace!(status, bytes = body.len(), "Received response");
        Ok(HttpReply { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<HttpReply, ProviderError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::finish(response).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<HttpReply, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::finish(response).await
    }
}
