//! HTTP middleware for the Congress.gov client.

use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use crate::utils::fmt_duration;

/// Query parameters that must never reach the logs.
const SECRET_PARAMS: &[&str] = &["api_key", "key"];

/// Logs each request with its latency, with credentials stripped from the URL.
pub struct TransactionLogger;

/// Returns `url` as a string with secret query parameters masked.
pub fn redact(url: &Url) -> String {
    if !url
        .query_pairs()
        .any(|(k, _)| SECRET_PARAMS.contains(&k.as_ref()))
    {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if SECRET_PARAMS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[async_trait::async_trait]
impl Middleware for TransactionLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let url = redact(req.url());
        let start = Instant::now();

        trace!(%method, url, "sending request");
        let result = next.run(req, extensions).await;
        let duration = fmt_duration(start.elapsed());

        match &result {
            Ok(response) if response.status().is_success() => {
                trace!(%method, url, status = response.status().as_u16(), duration, "request completed");
            }
            Ok(response) => {
                debug!(%method, url, status = response.status().as_u16(), duration, "request returned non-success status");
            }
            Err(error) => {
                warn!(%method, url, duration, error = %error, "request failed");
            }
        }

        result
    }
}
