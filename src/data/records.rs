//! Database operations for the `daily_records` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::data::models::{DailyRecord, DailyRecordInput, Reconciled};

pub async fn get(pool: &PgPool, issue_date: NaiveDate) -> Result<Option<DailyRecord>> {
    sqlx::query_as::<_, DailyRecord>(
        "SELECT issue_date, summary, pdf_url, created_at FROM daily_records WHERE issue_date = $1",
    )
    .bind(issue_date)
    .fetch_optional(pool)
    .await
    .context("failed to fetch daily record")
}

pub async fn latest(pool: &PgPool) -> Result<Option<DailyRecord>> {
    sqlx::query_as::<_, DailyRecord>(
        "SELECT issue_date, summary, pdf_url, created_at FROM daily_records ORDER BY issue_date DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest daily record")
}

/// Insert a record for a new issue date. An existing row wins.
pub async fn insert(pool: &PgPool, input: &DailyRecordInput) -> Result<Reconciled<DailyRecord>> {
    let inserted = sqlx::query_as::<_, DailyRecord>(
        r#"
        INSERT INTO daily_records (issue_date, summary, pdf_url)
        VALUES ($1, $2, $3)
        ON CONFLICT (issue_date) DO NOTHING
        RETURNING issue_date, summary, pdf_url, created_at
        "#,
    )
    .bind(input.issue_date)
    .bind(&input.summary)
    .bind(&input.pdf_url)
    .fetch_optional(pool)
    .await
    .context("failed to insert daily record")?;

    if let Some(entity) = inserted {
        return Ok(Reconciled {
            entity,
            created: true,
        });
    }

    let entity = get(pool, input.issue_date)
        .await?
        .context("daily record vanished after conflict")?;
    Ok(Reconciled {
        entity,
        created: false,
    })
}
