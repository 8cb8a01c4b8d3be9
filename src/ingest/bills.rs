//! Bill ingestion: recently updated bills of the current session, their
//! text summaries, and the recent-bills cache slot.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::{CacheRefresh, HashedCache};
use crate::congress::BillPath;
use crate::congress::models::ApiBill;
use crate::data::models::{Bill, BillKey, BillRecord};
use crate::ingest::Ingest;
use crate::ingest::fan_out::fan_out;
use crate::summarizer::{BILL_INSTRUCTION, BILL_TAG_COUNT, SummarizerError, SummaryRequest};
use crate::utils::fmt_duration;

pub const RECENT_BILLS_KEY: &str = "cache.recent_bills";
pub const RECENT_BILLS_LIMIT: i64 = 12;
pub const RECENT_BILLS_TTL: Duration = Duration::from_secs(60 * 60);

/// End of the last window whose walk finished cleanly.
pub const KV_BILLS_CURSOR: &str = "ingest.bills_cursor";

const PDF_MIME: &str = "application/pdf";

/// What to do about a bill's summary given the stored row and the newest text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryPlan {
    /// Stored summary was generated from this same document.
    Reuse,
    Generate(String),
    /// No text published yet; stored values stay.
    NoText,
}

pub fn plan_summary(existing: Option<&Bill>, pdf_url: Option<&str>) -> SummaryPlan {
    let Some(pdf_url) = pdf_url else {
        return SummaryPlan::NoText;
    };
    match existing {
        Some(bill) if bill.full_text_url.as_deref() == Some(pdf_url) => SummaryPlan::Reuse,
        _ => SummaryPlan::Generate(pdf_url.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated,
    Reused,
    NoText,
    /// Summarizer not configured.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessedBill {
    pub created: bool,
    pub summary: SummaryOutcome,
}

#[derive(Debug, Clone)]
pub struct BillsReport {
    pub session: i32,
    pub window_start: DateTime<Utc>,
    pub seen: usize,
    pub unique: usize,
    pub created: usize,
    pub generated: usize,
    pub reused: usize,
    pub summary_failures: usize,
    pub failed: usize,
    pub complete: bool,
    pub cursor_advanced: bool,
    pub cache: CacheRefresh,
}

#[derive(Debug, Clone)]
struct BillWork {
    key: BillKey,
    bill: ApiBill,
}

impl fmt::Display for BillWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

/// Keeps the first occurrence of each natural key. Listings are sorted by
/// update time descending, so that is the newest copy.
fn dedupe(bills: Vec<ApiBill>, session: i32) -> (Vec<BillWork>, usize) {
    let mut seen = HashSet::new();
    let mut work = Vec::with_capacity(bills.len());
    let mut unusable = 0;
    for bill in bills {
        let Some(number) = bill.number else {
            unusable += 1;
            continue;
        };
        let key = BillKey::new(bill.congress.unwrap_or(session), &bill.bill_type, number);
        if seen.insert(key.clone()) {
            work.push(BillWork { key, bill });
        }
    }
    (work, unusable)
}

/// Ingests bills of the current session updated since the stored cursor,
/// then refreshes the recent-bills cache slot (`force` rewrites it even when
/// unchanged).
#[tracing::instrument(skip_all, fields(force = force))]
pub async fn refresh_bills(ctx: &Ingest, now: DateTime<Utc>, force: bool) -> Result<BillsReport> {
    let start = Instant::now();
    let store = ctx.store.as_ref();

    let lookback = chrono::Duration::from_std(ctx.settings.bills_lookback)
        .unwrap_or_else(|_| chrono::Duration::hours(1));
    let window_start = store
        .get_timestamp(KV_BILLS_CURSOR)
        .await?
        .unwrap_or(now - lookback);
    let session = store.current_session(now.date_naive()).await?;

    let walk = ctx
        .api
        .bills_updated(session.number, window_start, now)
        .await
        .with_context(|| format!("failed to list bills updated in session {}", session.number))?;

    let seen = walk.items.len();
    let (work, unusable) = dedupe(walk.items, session.number);
    if unusable > 0 {
        debug!(unusable, "bills without a number skipped");
    }
    info!(
        session = session.number,
        from = %window_start,
        seen,
        unique = work.len(),
        "processing updated bills"
    );

    let unique = work.len();
    let outcome = fan_out(work, ctx.settings.bill_workers, "bill", |item| async move {
        process_bill(ctx, &item.key, &item.bill).await
    })
    .await;

    let mut report = BillsReport {
        session: session.number,
        window_start,
        seen,
        unique,
        created: 0,
        generated: 0,
        reused: 0,
        summary_failures: 0,
        failed: outcome.failed.len(),
        complete: walk.complete,
        cursor_advanced: false,
        cache: CacheRefresh::Unchanged,
    };
    for (_, processed) in &outcome.succeeded {
        if processed.created {
            report.created += 1;
        }
        match processed.summary {
            SummaryOutcome::Generated => report.generated += 1,
            SummaryOutcome::Reused => report.reused += 1,
            SummaryOutcome::Failed => report.summary_failures += 1,
            SummaryOutcome::NoText | SummaryOutcome::Skipped => {}
        }
    }

    // Anything left undone keeps the window open so the next run sees it again.
    if report.complete && report.failed == 0 && report.summary_failures == 0 {
        store.set_timestamp(KV_BILLS_CURSOR, now).await?;
        report.cursor_advanced = true;
    } else {
        warn!(
            complete = report.complete,
            failed = report.failed,
            summary_failures = report.summary_failures,
            "bills cursor held back"
        );
    }

    report.cache = refresh_recent_bills(ctx, force).await?;

    info!(
        created = report.created,
        generated = report.generated,
        reused = report.reused,
        summary_failures = report.summary_failures,
        failed = report.failed,
        cache = ?report.cache,
        duration = fmt_duration(start.elapsed()),
        "bills run completed"
    );
    Ok(report)
}

/// Rewrites the recent-bills slot when its content changed.
pub async fn refresh_recent_bills(ctx: &Ingest, force: bool) -> Result<CacheRefresh> {
    let recent = ctx.store.recent_bills(RECENT_BILLS_LIMIT).await?;
    HashedCache::new(ctx.store.as_ref())
        .refresh(RECENT_BILLS_KEY, &recent, Some(RECENT_BILLS_TTL), force)
        .await
}

/// Reconciles one bill, generating a summary only when its text changed.
///
/// Metadata is always written. When the text lookup or the summary fails,
/// the stored text URL, summary and tags are kept so a later run tries again.
pub async fn process_bill(ctx: &Ingest, key: &BillKey, bill: &ApiBill) -> Result<ProcessedBill> {
    let store = ctx.store.as_ref();
    let existing = store.find_bill(key).await?;

    // A missing text listing means nothing is published yet. Any other
    // failure is retried by the next run.
    let text_lookup = match ctx
        .api
        .bill_text_pdf(BillPath {
            session: key.session_number,
            bill_type: &key.bill_type,
            number: key.number,
        })
        .await
    {
        Ok(url) => Some(url),
        Err(e) if e.status() == Some(404) => Some(None),
        Err(e) => {
            warn!(bill = %key, error = %e, "text versions unavailable, keeping stored text");
            None
        }
    };

    let (mut full_text_url, mut summary, mut tags) = existing
        .as_ref()
        .map(|b| (b.full_text_url.clone(), b.summary.clone(), b.tags.clone()))
        .unwrap_or_default();

    let plan = text_lookup.map(|pdf_url| plan_summary(existing.as_ref(), pdf_url.as_deref()));
    let outcome = match plan {
        None => SummaryOutcome::Failed,
        Some(SummaryPlan::Reuse) => {
            debug!(bill = %key, "text unchanged, reusing summary");
            SummaryOutcome::Reused
        }
        Some(SummaryPlan::NoText) => SummaryOutcome::NoText,
        Some(SummaryPlan::Generate(url)) => match summarize_text(ctx, &url).await {
            Ok(generated) => {
                full_text_url = Some(url);
                summary = Some(generated.summary);
                tags = generated.tags;
                SummaryOutcome::Generated
            }
            Err(SummaryFailure::Summarizer(SummarizerError::Disabled)) => SummaryOutcome::Skipped,
            Err(e) => {
                warn!(bill = %key, error = %e, "summary failed, keeping previous values");
                SummaryOutcome::Failed
            }
        },
    };

    let latest_action = bill.latest_action.clone();
    let record = BillRecord {
        key: key.clone(),
        title: bill.title.clone(),
        origin_chamber: bill.origin_chamber.clone(),
        latest_action_date: latest_action.as_ref().and_then(|a| a.action_date),
        latest_action_text: latest_action.and_then(|a| a.text),
        url: bill.url.clone(),
        full_text_url,
        summary,
        tags,
    };
    let reconciled = store.reconcile_bill(&record).await?;

    Ok(ProcessedBill {
        created: reconciled.created,
        summary: outcome,
    })
}

#[derive(Debug, thiserror::Error)]
enum SummaryFailure {
    #[error("document download failed: {0}")]
    Download(#[from] crate::congress::CongressApiError),
    #[error(transparent)]
    Summarizer(#[from] SummarizerError),
}

async fn summarize_text(
    ctx: &Ingest,
    url: &str,
) -> Result<crate::summarizer::Summary, SummaryFailure> {
    let document = ctx.api.document(url).await?;
    let summary = ctx
        .summarizer
        .summarize(&SummaryRequest {
            document: &document,
            mime_type: PDF_MIME,
            instruction: BILL_INSTRUCTION,
            max_tags: BILL_TAG_COUNT,
        })
        .await?;
    Ok(summary)
}
