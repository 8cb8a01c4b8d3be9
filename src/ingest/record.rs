//! Daily Congressional Record digest.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::data::models::DailyRecordInput;
use crate::ingest::Ingest;
use crate::summarizer::{DIGEST_INSTRUCTION, SummarizerError, SummaryRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Upstream has no issue to report.
    NoIssue,
    /// A record for this date is already stored.
    AlreadyStored(NaiveDate),
    Stored { issue_date: NaiveDate, summarized: bool },
}

/// Stores the latest issue's digest summary unless that date is already present.
///
/// An issue without a digest link, or with no summarizer configured, is stored
/// without a summary. A failed summary stores nothing, so the next run retries.
#[tracing::instrument(skip_all)]
pub async fn refresh_daily_record(ctx: &Ingest) -> Result<RecordOutcome> {
    let Some(issue_date) = ctx
        .api
        .latest_daily_issue()
        .await
        .context("failed to fetch the latest record issue")?
    else {
        info!("no daily record issue listed");
        return Ok(RecordOutcome::NoIssue);
    };

    if ctx.store.daily_record(issue_date).await?.is_some() {
        info!(%issue_date, "daily record already stored");
        return Ok(RecordOutcome::AlreadyStored(issue_date));
    }

    let pdf_url = ctx
        .api
        .record_digest_pdf(issue_date)
        .await
        .with_context(|| format!("failed to look up the digest for {issue_date}"))?;

    let summary = match &pdf_url {
        Some(url) => match summarize_digest(ctx, url).await {
            Ok(summary) => Some(summary),
            Err(e) if matches!(e.downcast_ref::<SummarizerError>(), Some(SummarizerError::Disabled)) => None,
            Err(e) => {
                return Err(e.context(format!("failed to summarize the digest for {issue_date}")));
            }
        },
        None => {
            warn!(%issue_date, "issue has no digest PDF");
            None
        }
    };

    let summarized = summary.is_some();
    let stored = ctx
        .store
        .insert_daily_record(&DailyRecordInput {
            issue_date,
            summary,
            pdf_url,
        })
        .await?;

    info!(%issue_date, summarized, created = stored.created, "daily record stored");
    Ok(RecordOutcome::Stored {
        issue_date,
        summarized,
    })
}

async fn summarize_digest(ctx: &Ingest, url: &str) -> Result<String> {
    let document = ctx.api.document(url).await?;
    let summary = ctx
        .summarizer
        .summarize(&SummaryRequest {
            document: &document,
            mime_type: "application/pdf",
            instruction: DIGEST_INSTRUCTION,
            max_tags: 0,
        })
        .await?;
    Ok(summary.summary)
}
