//! HTTP client for the single forwarding sink.
//!
//! One client, and therefore one connection pool, is shared by every
//! delivery worker.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::config::ForwardConfig;
use crate::Result;

/// Longest prefix of a non-200 response body kept for logging.
pub const MAX_LOGGED_BODY: usize = 512;

/// Response from one POST to the sink.
#[derive(Debug, Clone)]
pub struct SinkResponse {
    pub status: StatusCode,
    /// Start of the response body for log lines; empty on 200.
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct SinkClient {
    client: reqwest::Client,
    url: String,
}

impl SinkClient {
    /// Creates a client posting to `config.url`.
    ///
    /// Redirects are never followed; a 3xx answer is reported like any other
    /// non-200 status.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the TLS backend cannot be initialised.
    pub fn new(config: &ForwardConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.concurrency)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one POST with the given body and headers.
    ///
    /// Any status is returned as `Ok`; only transport failures (connect,
    /// timeout, broken connection) are errors.
    pub async fn post(&self, body: Bytes, headers: HeaderMap) -> reqwest::Result<SinkResponse> {
        let response = self
            .client
            .post(&self.url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let keep = if status == StatusCode::OK { 0 } else { MAX_LOGGED_BODY };
        let body = read_body_prefix(response, keep).await;

        Ok(SinkResponse { status, body })
    }
}

/// Drains the body so the connection can be reused, keeping at most `limit`
/// bytes of it.
async fn read_body_prefix(mut response: reqwest::Response, limit: usize) -> String {
    let mut kept = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    String::from_utf8_lossy(&kept).into_owned()
}
