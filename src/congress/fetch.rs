//! Quota-aware fetching of Congress.gov resources.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::errors::CongressApiError;
use super::json::decode;
use super::middleware::redact;
use super::transport::{RawResponse, Transport};
use crate::pacer::Pacer;

/// Issues paced GET requests against the data API.
///
/// Every request waits on the shared [`Pacer`] first. When the upstream
/// refuses a request for quota reasons the fetcher sleeps for the advertised
/// `Retry-After` (falling back to the pacer's cooldown) and retries the same
/// URL; there is no retry limit for throttling. Any other non-success status
/// is returned as [`CongressApiError::Status`] for the caller to handle.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    pacer: Arc<Pacer>,
    base_url: Url,
    api_key: String,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        pacer: Arc<Pacer>,
        mut base_url: Url,
        api_key: impl Into<String>,
    ) -> Self {
        // `Url::join` drops the last segment unless the base ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            transport,
            pacer,
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a path such as `member/S000148` against the API root.
    pub fn endpoint(&self, path: &str) -> Result<Url, CongressApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| CongressApiError::InvalidEndpoint {
                path: path.to_string(),
                source,
            })
    }

    /// Adds the API key and JSON format to requests bound for the data API.
    /// Documents hosted elsewhere are fetched as-is.
    fn authorize(&self, url: &Url) -> Url {
        let mut target = url.clone();
        if target.host_str() != self.base_url.host_str() {
            return target;
        }

        let has = |name: &str| url.query_pairs().any(|(k, _)| k == name);
        let needs_key = !has("api_key");
        let needs_format = !has("format");
        if needs_key || needs_format {
            let mut pairs = target.query_pairs_mut();
            if needs_format {
                pairs.append_pair("format", "json");
            }
            if needs_key {
                pairs.append_pair("api_key", &self.api_key);
            }
        }
        target
    }

    /// Fetches `url`, absorbing throttling, and returns the successful response.
    pub async fn get_raw(&self, url: &Url) -> Result<RawResponse, CongressApiError> {
        let target = self.authorize(url);
        let display_url = redact(&target);
        let mut throttled: u32 = 0;

        loop {
            self.pacer.ready().await;

            let response = self.transport.get(&target).await.map_err(|source| {
                CongressApiError::RequestFailed {
                    url: display_url.clone(),
                    source,
                }
            })?;

            if response.is_throttled() {
                throttled += 1;
                warn!(
                    url = display_url,
                    status = response.status.as_u16(),
                    attempt = throttled,
                    "request throttled, retrying after cooldown"
                );
                self.pacer.cool_down(response.retry_after).await;
                continue;
            }

            if !response.status.is_success() {
                debug!(url = display_url, status = response.status.as_u16(), "non-success response");
                return Err(CongressApiError::Status {
                    status: response.status.as_u16(),
                    url: display_url,
                });
            }

            if response.exhausts_quota() {
                // The response is good, but the next call would be refused.
                self.pacer.cool_down(response.retry_after).await;
            }

            return Ok(response);
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, CongressApiError> {
        let response = self.get_raw(url).await?;
        let body = String::from_utf8_lossy(&response.body);
        decode(&body).map_err(|source| CongressApiError::ParseFailed {
            status: response.status.as_u16(),
            url: redact(url),
            source,
        })
    }

    /// Downloads a document (bill text, record digest) as raw bytes.
    pub async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, CongressApiError> {
        Ok(self.get_raw(url).await?.body)
    }
}
