//! Document summarization behind a quota-paced wrapper.

pub mod gemini;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::congress::json::decode;
use crate::pacer::Pacer;

pub use gemini::GeminiSummarizer;

/// Tags are short labels; longer ones are cut to this many characters.
pub const MAX_TAG_LEN: usize = 25;
pub const BILL_TAG_COUNT: usize = 3;

pub const BILL_INSTRUCTION: &str = "Summarize this bill in high school level language, \
provide key changes and provisions. Also provide 3 tags under 25 characters each.";

pub const DIGEST_INSTRUCTION: &str = "Summarize this daily digest of the Congressional Record \
in plain language a high school student can follow. Cover what each chamber did and any \
notable votes or measures passed.";

pub struct SummaryRequest<'a> {
    pub document: &'a [u8],
    pub mime_type: &'a str,
    pub instruction: &'a str,
    /// Zero means no tags are wanted.
    pub max_tags: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("summarizer quota exhausted: {0}")]
    RateLimited(String),
    #[error("summarizer returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("summarizer request failed")]
    Request(#[from] reqwest::Error),
    #[error("summarizer response could not be parsed")]
    InvalidResponse(#[source] anyhow::Error),
    #[error("no summarizer is configured")]
    Disabled,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Summary, SummarizerError>;
}

/// Stand-in used when no summarizer credentials are configured.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _request: &SummaryRequest<'_>) -> Result<Summary, SummarizerError> {
        Err(SummarizerError::Disabled)
    }
}

/// Spaces calls to the underlying summarizer and, on a rate-limit response,
/// cools down once and retries once.
pub struct PacedSummarizer {
    inner: Arc<dyn Summarizer>,
    pacer: Arc<Pacer>,
}

impl PacedSummarizer {
    pub fn new(inner: Arc<dyn Summarizer>, pacer: Arc<Pacer>) -> Self {
        Self { inner, pacer }
    }

    pub async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Summary, SummarizerError> {
        self.pacer.ready().await;
        let first = self.inner.summarize(request).await;

        let summary = match first {
            Err(SummarizerError::RateLimited(reason)) => {
                warn!(reason = %reason, "summarizer rate limited, retrying once after cooldown");
                self.pacer.cool_down(None).await;
                self.pacer.ready().await;
                self.inner.summarize(request).await?
            }
            other => other?,
        };

        let tags = normalize_tags(summary.tags, request.max_tags);
        debug!(chars = summary.summary.len(), tags = tags.len(), "document summarized");
        Ok(Summary {
            summary: summary.summary,
            tags,
        })
    }
}

/// Trims and truncates tags, drops empty ones and duplicates, and keeps at most `max`.
pub fn normalize_tags(tags: Vec<String>, max: usize) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(max);
    for tag in tags {
        if kept.len() >= max {
            break;
        }
        let tag: String = tag.trim().chars().take(MAX_TAG_LEN).collect();
        let tag = tag.trim_end();
        if tag.is_empty() || kept.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        kept.push(tag.to_string());
    }
    kept
}

/// Parses a model reply into a [`Summary`], tolerating Markdown code fences.
pub fn parse_summary(text: &str) -> Result<Summary, SummarizerError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let summary: Summary = decode(unfenced).map_err(|e| SummarizerError::InvalidResponse(e.into()))?;
    if summary.summary.trim().is_empty() {
        return Err(SummarizerError::InvalidResponse(anyhow::anyhow!("empty summary")));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacer::PacerSettings;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " Healthcare ".to_string(),
            "".to_string(),
            "healthcare".to_string(),
            "Veterans Affairs and Military Construction".to_string(),
            "Taxes".to_string(),
            "Budget".to_string(),
        ];
        assert_eq!(
            normalize_tags(tags, 3),
            vec!["Healthcare", "Veterans Affairs and Mili", "Taxes"]
        );
        assert!(normalize_tags(vec!["a".to_string()], 0).is_empty());
    }

    #[test]
    fn test_parse_summary_strips_fences() {
        let text = "```json\n{\"summary\": \"Funds roads.\", \"tags\": [\"Infrastructure\"]}\n```";
        let summary = parse_summary(text).unwrap();
        assert_eq!(summary.summary, "Funds roads.");
        assert_eq!(summary.tags, vec!["Infrastructure"]);
    }

    #[test]
    fn test_parse_summary_without_tags() {
        let summary = parse_summary(r#"{"summary": "The Senate met."}"#).unwrap();
        assert!(summary.tags.is_empty());
    }

    #[test]
    fn test_parse_summary_rejects_empty() {
        assert!(parse_summary(r#"{"summary": "  "}"#).is_err());
        assert!(parse_summary("not json").is_err());
    }

    /// Rate-limits the first `limited` calls, then succeeds.
    struct FlakySummarizer {
        limited: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Summarizer for FlakySummarizer {
        async fn summarize(&self, _request: &SummaryRequest<'_>) -> Result<Summary, SummarizerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.limited {
                return Err(SummarizerError::RateLimited("RESOURCE_EXHAUSTED".into()));
            }
            Ok(Summary {
                summary: "ok".into(),
                tags: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            })
        }
    }

    fn paced(limited: usize) -> (PacedSummarizer, Arc<FlakySummarizer>) {
        let inner = Arc::new(FlakySummarizer {
            limited,
            calls: AtomicUsize::new(0),
        });
        let settings = PacerSettings {
            max_calls: NonZeroU32::new(1000).unwrap(),
            interval: Duration::from_secs(1),
            burst: NonZeroU32::new(1000).unwrap(),
            cooldown: Duration::from_secs(60),
        };
        let pacer = Arc::new(Pacer::new("summarizer", settings).unwrap());
        (PacedSummarizer::new(inner.clone(), pacer), inner)
    }

    fn request() -> SummaryRequest<'static> {
        SummaryRequest {
            document: b"%PDF",
            mime_type: "application/pdf",
            instruction: BILL_INSTRUCTION,
            max_tags: BILL_TAG_COUNT,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_once_after_cooldown() {
        let (summarizer, inner) = paced(1);
        let start = tokio::time::Instant::now();

        let summary = summarizer.summarize(&request()).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(summary.tags.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_rate_limit_is_an_error() {
        let (summarizer, inner) = paced(2);
        let result = summarizer.summarize(&request()).await;

        assert!(matches!(result, Err(SummarizerError::RateLimited(_))));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
