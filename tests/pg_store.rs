//! Upsert, counter, and sweep behavior of the Postgres store.

use chrono::NaiveDate;
use repcheck::data::models::{
    BillKey, BillRecord, Chamber, DailyRecordInput, MemberDetailRecord, MemberEnrichment,
    MemberRecord, MembershipRecord, Session,
};
use repcheck::data::{PgStore, Store};
use sqlx::PgPool;
use std::time::Duration;

fn schumer(name: &str) -> MemberRecord {
    MemberRecord {
        bioguide_id: "S000148".to_owned(),
        name: name.to_owned(),
        state: "New York".to_owned(),
        image_url: Some("https://www.congress.gov/img/member/s000148.jpg".to_owned()),
        image_attribution: None,
    }
}

fn membership(session: i32, sponsored: i32, cosponsored: i32) -> MembershipRecord {
    MembershipRecord {
        session_number: session,
        chamber: Chamber::Senate,
        party: "Democratic".to_owned(),
        district: None,
        leadership_role: None,
        start_year: Some(2025),
        end_year: None,
        sponsored_count: sponsored,
        cosponsored_count: cosponsored,
    }
}

fn enrichment(memberships: Vec<MembershipRecord>) -> MemberEnrichment {
    MemberEnrichment {
        detail: MemberDetailRecord {
            birth_year: Some(1950),
            phone_number: Some("(202) 224-6542".to_owned()),
            ..Default::default()
        },
        memberships,
    }
}

fn hr1(summary: Option<&str>) -> BillRecord {
    BillRecord {
        key: BillKey::new(119, "HR", 1),
        title: Some("One Big Beautiful Bill Act".to_owned()),
        origin_chamber: Some("House".to_owned()),
        latest_action_date: NaiveDate::from_ymd_opt(2025, 7, 4),
        latest_action_text: Some("Became Public Law No: 119-21.".to_owned()),
        url: Some("https://api.congress.gov/v3/bill/119/hr/1".to_owned()),
        full_text_url: None,
        summary: summary.map(str::to_owned),
        tags: vec!["Taxes".to_owned()],
    }
}

async fn row_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count query failed")
}

#[sqlx::test]
async fn test_member_reconcile_twice_is_idempotent(pool: PgPool) {
    let store = PgStore::new(pool.clone());

    let first = store.reconcile_member(&schumer("Schumer, Charles E.")).await.unwrap();
    let second = store.reconcile_member(&schumer("Schumer, Charles E.")).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.entity.id, second.entity.id);
    assert_eq!(first.entity.last_updated, second.entity.last_updated);
    assert_eq!(row_count(&pool, "members").await, 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let renamed = store.reconcile_member(&schumer("Schumer, Chuck")).await.unwrap();
    assert!(!renamed.created);
    assert_eq!(renamed.entity.name, "Schumer, Chuck");
    assert!(renamed.entity.last_updated > first.entity.last_updated);
}

#[sqlx::test]
async fn test_session_and_bill_reconcile_report_creation(pool: PgPool) {
    let store = PgStore::new(pool.clone());

    assert!(store.reconcile_session(&Session::derived(119)).await.unwrap().created);
    assert!(!store.reconcile_session(&Session::derived(119)).await.unwrap().created);

    let first = store.reconcile_bill(&hr1(None)).await.unwrap();
    let again = store.reconcile_bill(&hr1(None)).await.unwrap();
    assert!(first.created);
    assert!(!again.created);
    assert_eq!(first.entity.updated_at, again.entity.updated_at);
    assert_eq!(row_count(&pool, "bills").await, 1);

    let found = store.find_bill(&BillKey::new(119, "hr", 1)).await.unwrap().unwrap();
    assert_eq!(found.id, first.entity.id);
    assert_eq!(found.tags, vec!["Taxes"]);
}

#[sqlx::test]
async fn test_bill_upsert_creates_missing_session(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    store.reconcile_bill(&hr1(Some("Cuts taxes."))).await.unwrap();

    let sessions = store.sessions().await.unwrap();
    assert_eq!(sessions, vec![Session::derived(119)]);
}

#[sqlx::test]
async fn test_activity_counters_never_decrease(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let member = store.reconcile_member(&schumer("Schumer, Charles E.")).await.unwrap().entity;

    store
        .record_enrichment(member.id, &enrichment(vec![membership(119, 12, 40)]))
        .await
        .unwrap();
    // A later run sees a smaller upstream total for sponsored bills.
    store
        .record_enrichment(member.id, &enrichment(vec![membership(119, 9, 41)]))
        .await
        .unwrap();

    let memberships = store.memberships(member.id).await.unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].sponsored_count, 12);
    assert_eq!(memberships[0].cosponsored_count, 41);

    let stored = store.member("S000148").await.unwrap().unwrap();
    assert!(stored.fully_processed);
    let detail = store.member_detail(member.id).await.unwrap().unwrap();
    assert_eq!(detail.birth_year, Some(1950));
}

#[sqlx::test]
async fn test_second_daily_record_insert_is_a_no_op(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let issue_date = NaiveDate::from_ymd_opt(2025, 7, 30).unwrap();

    let first = store
        .insert_daily_record(&DailyRecordInput {
            issue_date,
            summary: Some("The Senate confirmed nominees.".to_owned()),
            pdf_url: Some("https://www.congress.gov/119/crec/2025/07/30/171/130/CREC-2025-07-30-dailydigest.pdf".to_owned()),
        })
        .await
        .unwrap();
    let second = store
        .insert_daily_record(&DailyRecordInput {
            issue_date,
            summary: Some("A different summary.".to_owned()),
            pdf_url: None,
        })
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.entity, first.entity);
    assert_eq!(row_count(&pool, "daily_records").await, 1);
}

#[sqlx::test]
async fn test_sweep_clears_only_zero_count_members(pool: PgPool) {
    let store = PgStore::new(pool.clone());

    let active = store.reconcile_member(&schumer("Schumer, Charles E.")).await.unwrap().entity;
    let quiet = store
        .reconcile_member(&MemberRecord {
            bioguide_id: "P000197".to_owned(),
            name: "Pelosi, Nancy".to_owned(),
            state: "California".to_owned(),
            image_url: None,
            image_attribution: None,
        })
        .await
        .unwrap()
        .entity;

    store
        .record_enrichment(active.id, &enrichment(vec![membership(118, 3, 7), membership(119, 2, 1)]))
        .await
        .unwrap();
    store
        .record_enrichment(quiet.id, &enrichment(vec![membership(118, 4, 9), membership(119, 1, 0)]))
        .await
        .unwrap();

    assert_eq!(store.clear_incomplete_members().await.unwrap(), 1);
    assert!(store.member("S000148").await.unwrap().unwrap().fully_processed);
    assert!(!store.member("P000197").await.unwrap().unwrap().fully_processed);

    let pending: Vec<String> = store
        .members_pending_enrichment()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.bioguide_id)
        .collect();
    assert_eq!(pending, vec!["P000197"]);

    assert_eq!(store.clear_incomplete_members().await.unwrap(), 0);
}

#[sqlx::test]
async fn test_kv_respects_expiry(pool: PgPool) {
    let store = PgStore::new(pool);

    store.kv_set("ingest.bills_cursor", "2025-07-30T12:00:00Z", None).await.unwrap();
    store.kv_set("cache.recent_bills", "[]", Some(Duration::ZERO)).await.unwrap();

    assert_eq!(
        store.kv_get("ingest.bills_cursor").await.unwrap().as_deref(),
        Some("2025-07-30T12:00:00Z")
    );
    assert_eq!(store.kv_get("cache.recent_bills").await.unwrap(), None);
}
