//! Reference sync against a scripted Congress.gov: sessions, the member
//! directory, and enrichment with partial failures.

mod common;

use common::{CountingSummarizer, RouteTransport, api, ingest};
use repcheck::data::{MemoryStore, Store};
use repcheck::ingest::reference;
use serde_json::{Value, json};
use std::sync::Arc;

fn member(bioguide_id: &str, name: &str, state: &str) -> Value {
    json!({
        "bioguideId": bioguide_id,
        "name": name,
        "state": state,
        "depiction": { "imageUrl": format!("https://www.congress.gov/img/member/{bioguide_id}.jpg") }
    })
}

fn activity(field: &str, sessions: &[i32]) -> Value {
    let items: Vec<Value> = sessions.iter().map(|s| json!({ "congress": s })).collect();
    json!({ field: items, "pagination": { "count": sessions.len() } })
}

fn scripted_upstream() -> RouteTransport {
    RouteTransport::new()
        .json(
            "/v3/congress",
            json!({
                "congresses": [
                    { "name": "119th Congress", "startYear": "2025", "endYear": "2026" },
                    { "name": "118th Congress", "startYear": 2023, "endYear": 2024 }
                ],
                "pagination": { "count": 2 }
            }),
        )
        .json(
            "/v3/member",
            json!({
                "members": [
                    member("S000148", "Schumer, Charles E.", "New York"),
                    member("P000197", "Pelosi, Nancy", "California"),
                    { "name": "Missing Identifier" }
                ],
                "pagination": {
                    "count": 4,
                    "next": "https://api.congress.gov/v3/member?offset=250&limit=250&format=json"
                }
            }),
        )
        .json(
            "/v3/member?offset=250",
            json!({
                "members": [member("X000001", "Example, Broken", "Ohio")],
                "pagination": { "count": 4 }
            }),
        )
        .json(
            "/v3/member/S000148",
            json!({
                "member": {
                    "bioguideId": "S000148",
                    "birthYear": "1950",
                    "officialWebsiteUrl": "https://www.schumer.senate.gov/",
                    "addressInformation": { "phoneNumber": "(202) 224-6542" },
                    "terms": [
                        { "congress": 118, "chamber": "Senate", "startYear": 2023, "endYear": 2025, "stateCode": "NY" },
                        { "congress": 119, "chamber": "Senate", "startYear": 2025, "stateCode": "NY", "district": 3 }
                    ],
                    "partyHistory": [
                        { "partyName": "Independent", "startYear": 1975 },
                        { "partyName": "Democratic", "startYear": 1981 }
                    ],
                    "leadership": [{ "congress": 119, "type": "Minority Leader", "current": true }]
                }
            }),
        )
        .json(
            "/v3/member/S000148/sponsored-legislation",
            activity("sponsoredLegislation", &[119, 119, 118]),
        )
        .json(
            "/v3/member/S000148/cosponsored-legislation",
            activity("cosponsoredLegislation", &[119, 118, 118, 118]),
        )
        .json(
            "/v3/member/P000197",
            json!({
                "member": {
                    "bioguideId": "P000197",
                    "terms": [{ "congress": 119, "chamber": "House of Representatives", "startYear": 2025, "district": 11 }],
                    "partyHistory": [{ "partyName": "Democratic", "startYear": 1987 }]
                }
            }),
        )
        .json(
            "/v3/member/P000197/sponsored-legislation",
            activity("sponsoredLegislation", &[119]),
        )
        // P000197's cosponsored listing is missing upstream and answers 404.
        .json(
            "/v3/member/X000001",
            json!({ "member": { "bioguideId": "X000001", "terms": [] } }),
        )
        .json(
            "/v3/member/X000001/sponsored-legislation",
            activity("sponsoredLegislation", &[]),
        )
        .json(
            "/v3/member/X000001/cosponsored-legislation",
            activity("cosponsoredLegislation", &[]),
        )
}

#[tokio::test]
async fn test_reference_run_enriches_only_complete_members() {
    let transport = Arc::new(scripted_upstream());
    let store = Arc::new(MemoryStore::new());
    let ctx = ingest(transport.clone(), store.clone(), CountingSummarizer::new());

    ctx.run_reference().await.unwrap();

    let sessions: Vec<i32> = store.sessions().await.unwrap().iter().map(|s| s.number).collect();
    assert_eq!(sessions, vec![119, 118]);
    assert_eq!(store.member_count().await, 3);

    let schumer = store.member("S000148").await.unwrap().unwrap();
    assert!(schumer.fully_processed);
    assert_eq!(schumer.name, "Schumer, Charles E.");

    let memberships = store.memberships(schumer.id).await.unwrap();
    assert_eq!(memberships.len(), 2);
    let current = &memberships[0];
    assert_eq!(current.session_number, 119);
    assert_eq!(current.chamber, "Senate");
    assert_eq!(current.party, "Democratic");
    assert_eq!(current.district, None);
    assert_eq!(current.leadership_role.as_deref(), Some("Minority Leader"));
    assert_eq!(current.sponsored_count, 2);
    assert_eq!(current.cosponsored_count, 1);
    assert_eq!(memberships[1].sponsored_count, 1);
    assert_eq!(memberships[1].cosponsored_count, 3);

    let detail = store.member_detail(schumer.id).await.unwrap().unwrap();
    assert_eq!(detail.birth_year, Some(1950));
    assert_eq!(detail.phone_number.as_deref(), Some("(202) 224-6542"));

    // A failed activity fetch leaves the member pending with nothing written.
    let pelosi = store.member("P000197").await.unwrap().unwrap();
    assert!(!pelosi.fully_processed);
    assert!(store.memberships(pelosi.id).await.unwrap().is_empty());
    assert!(store.member_detail(pelosi.id).await.unwrap().is_none());

    // No usable terms is malformed, not fatal.
    let broken = store.member("X000001").await.unwrap().unwrap();
    assert!(!broken.fully_processed);
}

#[tokio::test]
async fn test_second_run_only_retries_pending_members() {
    let transport = Arc::new(scripted_upstream());
    let store = Arc::new(MemoryStore::new());
    let ctx = ingest(transport.clone(), store.clone(), CountingSummarizer::new());

    ctx.run_reference().await.unwrap();
    ctx.run_reference().await.unwrap();

    assert_eq!(store.member_count().await, 3);
    assert_eq!(transport.count("/v3/member/S000148").await, 1);
    assert_eq!(transport.count("/v3/member/P000197").await, 2);
    assert_eq!(transport.count("/v3/member?offset=250").await, 2);

    let pending: Vec<String> = store
        .members_pending_enrichment()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.bioguide_id)
        .collect();
    assert_eq!(pending, vec!["P000197", "X000001"]);
}

#[tokio::test]
async fn test_member_directory_changes_update_in_place() {
    let store = MemoryStore::new();

    let first = Arc::new(scripted_upstream());
    let counts = reference::sync_members(&api(first), &store).await.unwrap();
    assert_eq!(counts.created, 3);
    assert_eq!(counts.skipped, 1);

    let renamed = Arc::new(RouteTransport::new().json(
        "/v3/member",
        json!({
            "members": [member("S000148", "Schumer, Chuck", "New York")],
            "pagination": { "count": 1 }
        }),
    ));
    let counts = reference::sync_members(&api(renamed), &store).await.unwrap();
    assert_eq!(counts.created, 0);
    assert_eq!(store.member_count().await, 3);
    assert_eq!(
        store.member("S000148").await.unwrap().unwrap().name,
        "Schumer, Chuck"
    );
}

#[tokio::test]
async fn test_sweep_reopens_members_with_empty_activity() {
    let transport = Arc::new(
        scripted_upstream()
            .json(
                "/v3/member/P000197/cosponsored-legislation",
                activity("cosponsoredLegislation", &[]),
            ),
    );
    let store = Arc::new(MemoryStore::new());
    let ctx = ingest(transport, store.clone(), CountingSummarizer::new());

    ctx.run_reference().await.unwrap();
    let pelosi = store.member("P000197").await.unwrap().unwrap();
    assert!(pelosi.fully_processed);

    // Pelosi has no cosponsorships in 119; Schumer has activity everywhere.
    assert_eq!(ctx.sweep().await.unwrap(), 1);
    assert!(!store.member("P000197").await.unwrap().unwrap().fully_processed);
    assert!(store.member("S000148").await.unwrap().unwrap().fully_processed);

    // Sweeping again changes nothing.
    assert_eq!(ctx.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn test_seed_sessions_fills_gaps_only() {
    let store = MemoryStore::new();
    let today = chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    let first = reference::seed_sessions(&store, today).await.unwrap();
    assert_eq!(first.created, 119);

    let again = reference::seed_sessions(&store, today).await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(store.sessions().await.unwrap().len(), 119);
}
