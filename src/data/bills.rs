//! Database operations for the `bills` table.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::data::models::{Bill, BillKey, BillRecord, Reconciled, Session};
use crate::data::{PageWindow, sessions};

const BILL_COLUMNS: &str = "id, session_number, bill_type, number, title, origin_chamber, \
     latest_action_date, latest_action_text, url, full_text_url, summary, tags, updated_at";

#[derive(sqlx::FromRow)]
struct BillRow {
    #[sqlx(flatten)]
    bill: Bill,
    created: bool,
}

pub async fn find(pool: &PgPool, key: &BillKey) -> Result<Option<Bill>> {
    sqlx::query_as::<_, Bill>(&format!(
        "SELECT {BILL_COLUMNS} FROM bills WHERE session_number = $1 AND bill_type = $2 AND number = $3"
    ))
    .bind(key.session_number)
    .bind(&key.bill_type)
    .bind(key.number)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch bill {key}"))
}

/// Insert or update a bill keyed on `(session, type, number)`.
pub async fn upsert(pool: &PgPool, record: &BillRecord) -> Result<Reconciled<Bill>> {
    sessions::ensure_exist(pool, &[Session::derived(record.key.session_number)]).await?;

    let row = sqlx::query_as::<_, BillRow>(&format!(
        r#"
        INSERT INTO bills
            (session_number, bill_type, number, title, origin_chamber, latest_action_date,
             latest_action_text, url, full_text_url, summary, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (session_number, bill_type, number) DO UPDATE SET
            title = EXCLUDED.title,
            origin_chamber = EXCLUDED.origin_chamber,
            latest_action_date = EXCLUDED.latest_action_date,
            latest_action_text = EXCLUDED.latest_action_text,
            url = EXCLUDED.url,
            full_text_url = EXCLUDED.full_text_url,
            summary = EXCLUDED.summary,
            tags = EXCLUDED.tags,
            updated_at = CASE
                WHEN (bills.title, bills.origin_chamber, bills.latest_action_date,
                      bills.latest_action_text, bills.url, bills.full_text_url,
                      bills.summary, bills.tags)
                     IS DISTINCT FROM
                     (EXCLUDED.title, EXCLUDED.origin_chamber, EXCLUDED.latest_action_date,
                      EXCLUDED.latest_action_text, EXCLUDED.url, EXCLUDED.full_text_url,
                      EXCLUDED.summary, EXCLUDED.tags)
                THEN now()
                ELSE bills.updated_at
            END
        RETURNING {BILL_COLUMNS}, (xmax = 0) AS created
        "#
    ))
    .bind(record.key.session_number)
    .bind(&record.key.bill_type)
    .bind(record.key.number)
    .bind(&record.title)
    .bind(&record.origin_chamber)
    .bind(record.latest_action_date)
    .bind(&record.latest_action_text)
    .bind(&record.url)
    .bind(&record.full_text_url)
    .bind(&record.summary)
    .bind(&record.tags)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert bill {}", record.key))?;

    Ok(Reconciled {
        entity: row.bill,
        created: row.created,
    })
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Bill>> {
    sqlx::query_as::<_, Bill>(&format!(
        "SELECT {BILL_COLUMNS} FROM bills ORDER BY latest_action_date DESC NULLS LAST, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch recent bills")
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    12
}

/// Query parameters for `GET /api/bills`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillListParams {
    pub search: Option<String>,
    pub session: Option<i32>,
    pub tag: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillListResponse {
    pub bills: Vec<Bill>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(sqlx::FromRow)]
struct BillListRow {
    #[sqlx(flatten)]
    bill: Bill,
    total_count: i64,
}

/// Locally stored bills, matching title, summary, type, number, or tag.
pub async fn list(pool: &PgPool, params: &BillListParams) -> Result<BillListResponse> {
    let window = PageWindow::new(params.page, params.per_page);
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let rows = sqlx::query_as::<_, BillListRow>(&format!(
        r#"
        SELECT {BILL_COLUMNS}, COUNT(*) OVER () AS total_count
        FROM bills
        WHERE ($1::text IS NULL
               OR title ILIKE '%' || $1 || '%'
               OR summary ILIKE '%' || $1 || '%'
               OR bill_type || number::text ILIKE replace(replace($1, '.', ''), ' ', '')
               OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE '%' || $1 || '%'))
          AND ($2::int4 IS NULL OR session_number = $2)
          AND ($3::text IS NULL OR $3 = ANY(tags))
        ORDER BY latest_action_date DESC NULLS LAST, id DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(search)
    .bind(params.session)
    .bind(params.tag.as_deref())
    .bind(window.per_page)
    .bind(window.offset)
    .fetch_all(pool)
    .await
    .context("failed to list bills")?;

    let total = rows.first().map_or(0, |r| r.total_count);
    Ok(BillListResponse {
        bills: rows.into_iter().map(|r| r.bill).collect(),
        total,
        page: window.page,
        per_page: window.per_page,
    })
}
