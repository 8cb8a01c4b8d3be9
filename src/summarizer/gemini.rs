//! Gemini `generateContent` client producing structured summaries.

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::trace;
use url::Url;

use super::{Summarizer, SummarizerError, Summary, SummaryRequest, parse_summary};

pub struct GeminiSummarizer {
    http: reqwest::Client,
    base_url: Url,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiSummarizer {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid summarizer base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create summarizer HTTP client")?;
        Ok(Self {
            http,
            base_url,
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> Result<Url, SummarizerError> {
        let mut url = self
            .base_url
            .join(&format!("models/{}:generateContent", self.model))
            .map_err(|e| SummarizerError::InvalidResponse(e.into()))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

/// JSON schema the model is asked to answer with.
fn response_schema(max_tags: usize) -> Value {
    if max_tags == 0 {
        return json!({
            "type": "OBJECT",
            "properties": { "summary": { "type": "STRING" } },
            "required": ["summary"],
        });
    }
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "tags": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "maxItems": max_tags,
            },
        },
        "required": ["summary", "tags"],
    })
}

fn request_body(request: &SummaryRequest<'_>) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(request.document);
    json!({
        "contents": [{
            "parts": [
                { "inline_data": { "mime_type": request.mime_type, "data": data } },
                { "text": request.instruction },
            ],
        }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "response_schema": response_schema(request.max_tags),
        },
    })
}

fn is_quota_error(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED")
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<Summary, SummarizerError> {
        let url = self.endpoint()?;
        trace!(model = %self.model, bytes = request.document.len(), "requesting summary");

        let response = self
            .http
            .post(url)
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if is_quota_error(status, &body) {
            return Err(SummarizerError::RateLimited(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(SummarizerError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateContentResponse = crate::congress::json::decode(&body)
            .map_err(|e| SummarizerError::InvalidResponse(e.into()))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        parse_summary(&text)
    }
}
