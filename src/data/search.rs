//! Cross-entity search backing `GET /api/search`.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::PgPool;
use std::time::{Duration, Instant};

use crate::data::models::{Bill, Session};
use crate::utils::log_if_slow;

/// Max hits returned per entity kind.
const PER_KIND_LIMIT: i64 = 20;

const SLOW_SEARCH: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberHit {
    pub bioguide_id: String,
    pub name: String,
    pub state: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub members: Vec<MemberHit>,
    pub sessions: Vec<Session>,
    pub bills: Vec<Bill>,
}

/// Members by name or state, sessions by number, bills by title, summary,
/// designation, or tag.
pub async fn search_all(pool: &PgPool, query: &str) -> Result<SearchResults> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(SearchResults::default());
    }
    let session_number: Option<i32> = query
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok();

    let members = sqlx::query_as::<_, MemberHit>(
        r#"
        SELECT bioguide_id, name, state, image_url
        FROM members
        WHERE name ILIKE '%' || $1 || '%' OR state ILIKE '%' || $1 || '%'
        ORDER BY similarity(name, $1) DESC, name
        LIMIT $2
        "#,
    )
    .bind(query)
    .bind(PER_KIND_LIMIT)
    .fetch_all(pool);

    let sessions = sqlx::query_as::<_, Session>(
        r#"
        SELECT number, start_date, end_date FROM sessions
        WHERE number = $1 OR $2 BETWEEN EXTRACT(YEAR FROM start_date)::int4 AND EXTRACT(YEAR FROM end_date)::int4 - 1
        ORDER BY number DESC
        LIMIT $3
        "#,
    )
    .bind(session_number)
    .bind(session_number)
    .bind(PER_KIND_LIMIT)
    .fetch_all(pool);

    let bills = sqlx::query_as::<_, Bill>(
        r#"
        SELECT id, session_number, bill_type, number, title, origin_chamber, latest_action_date,
               latest_action_text, url, full_text_url, summary, tags, updated_at
        FROM bills
        WHERE title ILIKE '%' || $1 || '%'
           OR summary ILIKE '%' || $1 || '%'
           OR bill_type ILIKE $1
           OR number::text = $1
           OR bill_type || number::text ILIKE replace(replace($1, '.', ''), ' ', '')
           OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE '%' || $1 || '%')
        ORDER BY latest_action_date DESC NULLS LAST, id DESC
        LIMIT $2
        "#,
    )
    .bind(query)
    .bind(PER_KIND_LIMIT)
    .fetch_all(pool);

    let start = Instant::now();
    let (members, sessions, bills) = tokio::try_join!(members, sessions, bills)
        .context("failed to run search queries")?;
    log_if_slow(start, SLOW_SEARCH, "search");

    Ok(SearchResults {
        query: query.to_string(),
        members,
        sessions,
        bills,
    })
}
