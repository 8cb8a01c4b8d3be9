//! Bill ingestion: dedup, content-addressed summary reuse, cursor handling,
//! and the recent-bills cache slot.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{CountingSummarizer, RouteTransport, ingest};
use http::StatusCode;
use repcheck::cache::{CacheRefresh, HashedCache};
use repcheck::data::models::{Bill, BillKey, Session};
use repcheck::data::{MemoryStore, Store};
use repcheck::ingest::bills::{KV_BILLS_CURSOR, RECENT_BILLS_KEY, refresh_bills};
use repcheck::summarizer::DisabledSummarizer;
use serde_json::{Value, json};
use std::sync::Arc;

const HR1_PDF: &str = "https://www.congress.gov/119/bills/hr1/BILLS-119hr1enr.pdf";
const HR1_PDF_V2: &str = "https://www.congress.gov/119/bills/hr1/BILLS-119hr1eas.pdf";
const HR7_PDF: &str = "https://www.congress.gov/119/bills/hr7/BILLS-119hr7rfs.pdf";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 30, 12, 0, 0).unwrap()
}

fn bill(bill_type: &str, number: Value, title: &str, action_date: &str) -> Value {
    json!({
        "congress": 119,
        "type": bill_type,
        "number": number,
        "title": title,
        "originChamber": "House",
        "latestAction": { "actionDate": action_date, "text": "Became Public Law." },
        "url": format!("https://api.congress.gov/v3/bill/119/{}/{}", bill_type.to_lowercase(), number)
    })
}

fn text_versions(pdf: &str) -> Value {
    json!({
        "textVersions": [{
            "date": "2025-07-04T04:00:00Z",
            "type": "Enrolled Bill",
            "formats": [
                { "type": "Formatted Text", "url": pdf.replace(".pdf", ".htm") },
                { "type": "PDF", "url": pdf }
            ]
        }]
    })
}

fn upstream(hr1_pdf: &str) -> RouteTransport {
    let pdf_route = url::Url::parse(hr1_pdf).unwrap().path().to_string();
    RouteTransport::new()
        .json(
            "/v3/bill/119",
            json!({
                "bills": [
                    bill("HR", json!("1"), "One Big Beautiful Bill Act", "2025-07-04"),
                    bill("HR", json!(1), "One Big Beautiful Bill Act (older copy)", "2025-07-03"),
                    bill("S", json!(5), "Laken Riley Act", "2025-01-29"),
                    bill("HR", json!(7), "No Taxpayer Funding for Abortion Act", "2025-01-22"),
                    bill("HRES", Value::Null, "Unnumbered", "2025-01-01")
                ],
                "pagination": { "count": 5 }
            }),
        )
        .json("/v3/bill/119/hr/1/text", text_versions(hr1_pdf))
        .json("/v3/bill/119/s/5/text", json!({ "textVersions": [] }))
        // H.R. 7's text listing answers 404.
        .bytes(&pdf_route, b"%PDF-1.7 hr1")
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.reconcile_session(&Session::derived(119)).await.unwrap();
    store
}

#[tokio::test]
async fn test_first_run_stores_bills_and_summarizes_text() {
    let store = seeded_store().await;
    let summarizer = CountingSummarizer::new();
    let ctx = ingest(Arc::new(upstream(HR1_PDF)), store.clone(), summarizer.clone());

    let report = refresh_bills(&ctx, now(), false).await.unwrap();
    assert_eq!(report.session, 119);
    assert_eq!(report.seen, 5);
    assert_eq!(report.unique, 3);
    assert_eq!(report.created, 3);
    assert_eq!(report.generated, 1);
    assert_eq!(report.failed, 0);
    assert!(report.cursor_advanced);
    assert_eq!(report.cache, CacheRefresh::Updated);
    assert_eq!(summarizer.calls(), 1);
    assert_eq!(store.bill_count().await, 3);

    let hr1 = store.find_bill(&BillKey::new(119, "HR", 1)).await.unwrap().unwrap();
    assert_eq!(hr1.title.as_deref(), Some("One Big Beautiful Bill Act"));
    assert_eq!(hr1.full_text_url.as_deref(), Some(HR1_PDF));
    assert_eq!(hr1.summary.as_deref(), Some("summary #1 of 12 bytes"));
    assert_eq!(hr1.tags, vec!["Healthcare", "Taxes"]);

    // Missing text, whether empty or unavailable, stores metadata only.
    for key in [BillKey::new(119, "s", 5), BillKey::new(119, "hr", 7)] {
        let stored = store.find_bill(&key).await.unwrap().unwrap();
        assert!(stored.summary.is_none());
        assert!(stored.full_text_url.is_none());
    }

    assert_eq!(store.get_timestamp(KV_BILLS_CURSOR).await.unwrap(), Some(now()));

    let cached: Vec<Bill> = HashedCache::new(store.as_ref())
        .get(RECENT_BILLS_KEY)
        .await
        .unwrap()
        .unwrap();
    let order: Vec<i32> = cached.iter().map(|b| b.number).collect();
    assert_eq!(order, vec![1, 5, 7]);
}

#[tokio::test]
async fn test_unchanged_text_reuses_summary() {
    let store = seeded_store().await;
    let summarizer = CountingSummarizer::new();
    let ctx = ingest(Arc::new(upstream(HR1_PDF)), store.clone(), summarizer.clone());

    refresh_bills(&ctx, now(), false).await.unwrap();
    let later = now() + chrono::Duration::minutes(15);
    let report = refresh_bills(&ctx, later, false).await.unwrap();

    assert_eq!(report.window_start, now());
    assert_eq!(report.created, 0);
    assert_eq!(report.generated, 0);
    assert_eq!(report.reused, 1);
    assert_eq!(report.cache, CacheRefresh::Unchanged);
    assert_eq!(summarizer.calls(), 1);

    // `force` rewrites the slot even though nothing changed.
    let forced = refresh_bills(&ctx, later, true).await.unwrap();
    assert_eq!(forced.cache, CacheRefresh::Updated);
}

#[tokio::test]
async fn test_new_text_version_is_summarized_again() {
    let store = seeded_store().await;
    let summarizer = CountingSummarizer::new();

    let first = ingest(Arc::new(upstream(HR1_PDF)), store.clone(), summarizer.clone());
    refresh_bills(&first, now(), false).await.unwrap();

    let second = ingest(Arc::new(upstream(HR1_PDF_V2)), store.clone(), summarizer.clone());
    let report = refresh_bills(&second, now() + chrono::Duration::minutes(15), false)
        .await
        .unwrap();

    assert_eq!(report.generated, 1);
    assert_eq!(summarizer.calls(), 2);
    let hr1 = store.find_bill(&BillKey::new(119, "hr", 1)).await.unwrap().unwrap();
    assert_eq!(hr1.full_text_url.as_deref(), Some(HR1_PDF_V2));
    assert_eq!(hr1.summary.as_deref(), Some("summary #2 of 12 bytes"));
}

#[tokio::test]
async fn test_summary_failure_holds_cursor_and_retries() {
    let store = seeded_store().await;

    let failing = ingest(
        Arc::new(upstream(HR1_PDF)),
        store.clone(),
        CountingSummarizer::failing(),
    );
    let report = refresh_bills(&failing, now(), false).await.unwrap();
    assert_eq!(report.summary_failures, 1);
    assert_eq!(report.created, 3);
    assert!(!report.cursor_advanced);
    assert_eq!(store.get_timestamp(KV_BILLS_CURSOR).await.unwrap(), None);

    // Metadata is kept, but no text URL is recorded for a failed summary.
    let hr1 = store.find_bill(&BillKey::new(119, "hr", 1)).await.unwrap().unwrap();
    assert!(hr1.full_text_url.is_none());
    assert!(hr1.summary.is_none());

    let summarizer = CountingSummarizer::new();
    let retry = ingest(Arc::new(upstream(HR1_PDF)), store.clone(), summarizer.clone());
    let report = refresh_bills(&retry, now(), false).await.unwrap();
    assert_eq!(report.generated, 1);
    assert!(report.cursor_advanced);
    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn test_text_lookup_error_holds_cursor() {
    let store = seeded_store().await;
    let summarizer = CountingSummarizer::new();
    let transport = upstream(HR1_PDF).status("/v3/bill/119/hr/7/text", StatusCode::INTERNAL_SERVER_ERROR);
    let ctx = ingest(Arc::new(transport), store.clone(), summarizer.clone());

    let report = refresh_bills(&ctx, now(), false).await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.summary_failures, 1);
    assert!(!report.cursor_advanced);
    assert_eq!(store.get_timestamp(KV_BILLS_CURSOR).await.unwrap(), None);

    // Metadata is stored; the summary waits for a run where the text answers.
    let hr7 = store.find_bill(&BillKey::new(119, "hr", 7)).await.unwrap().unwrap();
    assert_eq!(hr7.title.as_deref(), Some("No Taxpayer Funding for Abortion Act"));
    assert!(hr7.summary.is_none());

    let retry = ingest(
        Arc::new(
            upstream(HR1_PDF)
                .json("/v3/bill/119/hr/7/text", text_versions(HR7_PDF))
                .bytes("/119/bills/hr7/BILLS-119hr7rfs.pdf", b"%PDF-1.7 hr7"),
        ),
        store.clone(),
        summarizer.clone(),
    );
    let report = refresh_bills(&retry, now(), false).await.unwrap();
    assert!(report.cursor_advanced);
    let hr7 = store.find_bill(&BillKey::new(119, "hr", 7)).await.unwrap().unwrap();
    assert_eq!(hr7.full_text_url.as_deref(), Some(HR7_PDF));
    assert!(hr7.summary.is_some());
}

#[tokio::test]
async fn test_disabled_summarizer_skips_without_holding_cursor() {
    let store = seeded_store().await;
    let ctx = ingest(
        Arc::new(upstream(HR1_PDF)),
        store.clone(),
        Arc::new(DisabledSummarizer),
    );

    let report = refresh_bills(&ctx, now(), false).await.unwrap();
    assert_eq!(report.generated, 0);
    assert_eq!(report.summary_failures, 0);
    assert!(report.cursor_advanced);

    let hr1 = store.find_bill(&BillKey::new(119, "hr", 1)).await.unwrap().unwrap();
    assert!(hr1.summary.is_none());
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let store = seeded_store().await;
    let ctx = ingest(
        Arc::new(RouteTransport::new()),
        store.clone(),
        CountingSummarizer::new(),
    );

    assert!(refresh_bills(&ctx, now(), false).await.is_err());
    assert_eq!(store.bill_count().await, 0);
    assert_eq!(store.get_timestamp(KV_BILLS_CURSOR).await.unwrap(), None);
}
