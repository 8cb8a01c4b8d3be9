//! The raw HTTP seam underneath [`Fetcher`](super::Fetcher).

use anyhow::Context;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;
use url::Url;

use super::middleware::TransactionLogger;

const USER_AGENT: &str = concat!("repcheck/", env!("CARGO_PKG_VERSION"));

/// Status, quota headers, and body of a single upstream response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    /// `X-RateLimit-Remaining`, when the upstream reports it.
    pub remaining: Option<u32>,
    /// `Retry-After`, in seconds.
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            remaining: None,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_quota(mut self, remaining: Option<u32>, retry_after: Option<Duration>) -> Self {
        self.remaining = remaining;
        self.retry_after = retry_after;
        self
    }

    /// The request was refused because the quota is spent; retrying after a
    /// pause is expected to succeed.
    pub fn is_throttled(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
            || (self.remaining == Some(0) && !self.status.is_success())
    }

    /// The request succeeded but used up the last call of the window.
    pub fn exhausts_quota(&self) -> bool {
        self.status.is_success() && self.remaining == Some(0)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse, reqwest_middleware::Error>;
}

/// Production transport backed by reqwest with request logging.
pub struct HttpTransport {
    client: ClientWithMiddleware,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client: ClientBuilder::new(client).with(TransactionLogger).build(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, reqwest_middleware::Error> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let remaining = header_number(response.headers(), "x-ratelimit-remaining");
        let retry_after =
            header_number(response.headers(), "retry-after").map(|s| Duration::from_secs(s.into()));
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            remaining,
            retry_after,
            body,
        })
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
