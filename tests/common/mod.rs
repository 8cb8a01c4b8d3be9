//! Scripted upstreams and a wired-up [`Ingest`] over the in-memory store.

#![allow(dead_code)]

use async_trait::async_trait;
use http::StatusCode;
use repcheck::congress::{CongressApi, Fetcher, RawResponse, Transport};
use repcheck::data::MemoryStore;
use repcheck::ingest::{Ingest, IngestSettings};
use repcheck::pacer::{Pacer, PacerSettings};
use repcheck::summarizer::{PacedSummarizer, Summarizer, SummarizerError, Summary, SummaryRequest};
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

pub const API_BASE: &str = "https://api.congress.gov/v3/";

/// Route key for a request: the path, plus `?offset=N` past the first page.
pub fn route_key(url: &Url) -> String {
    let offset = url
        .query_pairs()
        .find(|(k, _)| k == "offset")
        .map(|(_, v)| v.into_owned());
    match offset {
        Some(offset) if offset != "0" => format!("{}?offset={offset}", url.path()),
        _ => url.path().to_string(),
    }
}

/// Serves canned responses by route and records every route requested.
/// Unknown routes answer 404.
#[derive(Default)]
pub struct RouteTransport {
    routes: HashMap<String, RawResponse>,
    calls: Mutex<Vec<String>>,
}

impl RouteTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, route: &str, body: Value) -> Self {
        self.routes
            .insert(route.to_string(), RawResponse::new(StatusCode::OK, body.to_string()));
        self
    }

    pub fn bytes(mut self, route: &str, body: &[u8]) -> Self {
        self.routes
            .insert(route.to_string(), RawResponse::new(StatusCode::OK, body.to_vec()));
        self
    }

    pub fn status(mut self, route: &str, status: StatusCode) -> Self {
        self.routes
            .insert(route.to_string(), RawResponse::new(status, ""));
        self
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub async fn count(&self, route: &str) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == route).count()
    }
}

#[async_trait]
impl Transport for RouteTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, reqwest_middleware::Error> {
        let key = route_key(url);
        self.calls.lock().await.push(key.clone());
        Ok(self
            .routes
            .get(&key)
            .cloned()
            .unwrap_or_else(|| RawResponse::new(StatusCode::NOT_FOUND, "")))
    }
}

/// Answers every request with a summary naming the call number, or fails
/// when built with [`CountingSummarizer::failing`].
pub struct CountingSummarizer {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingSummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Summary, SummarizerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(SummarizerError::Status {
                status: 500,
                body: "backend error".into(),
            });
        }
        Ok(Summary {
            summary: format!("summary #{n} of {} bytes", request.document.len()),
            tags: vec!["Healthcare".into(), "healthcare".into(), "Taxes".into()],
        })
    }
}

fn fast_pacer(name: &'static str) -> Arc<Pacer> {
    let settings = PacerSettings {
        max_calls: NonZeroU32::new(10_000).unwrap(),
        interval: Duration::from_secs(1),
        burst: NonZeroU32::new(10_000).unwrap(),
        cooldown: Duration::from_secs(1),
    };
    Arc::new(Pacer::new(name, settings).unwrap())
}

pub fn api(transport: Arc<RouteTransport>) -> Arc<CongressApi> {
    let fetcher = Fetcher::new(
        transport,
        fast_pacer("congress"),
        Url::parse(API_BASE).unwrap(),
        "TEST_KEY",
    );
    Arc::new(CongressApi::new(fetcher))
}

pub fn ingest(
    transport: Arc<RouteTransport>,
    store: Arc<MemoryStore>,
    summarizer: Arc<dyn Summarizer>,
) -> Ingest {
    Ingest::new(
        api(transport),
        store,
        Arc::new(PacedSummarizer::new(summarizer, fast_pacer("summarizer"))),
        IngestSettings {
            member_workers: 3,
            bill_workers: 2,
            bills_lookback: Duration::from_secs(15 * 60),
        },
    )
}
