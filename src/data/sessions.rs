//! Database operations for the `sessions` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::data::models::{Reconciled, Session};

#[derive(sqlx::FromRow)]
struct SessionRow {
    #[sqlx(flatten)]
    session: Session,
    created: bool,
}

/// Insert or update a session keyed on its number.
pub async fn upsert(pool: &PgPool, session: &Session) -> Result<Reconciled<Session>> {
    let row = sqlx::query_as::<_, SessionRow>(
        r#"
        INSERT INTO sessions (number, start_date, end_date)
        VALUES ($1, $2, $3)
        ON CONFLICT (number) DO UPDATE
        SET start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date
        RETURNING number, start_date, end_date, (xmax = 0) AS created
        "#,
    )
    .bind(session.number)
    .bind(session.start_date)
    .bind(session.end_date)
    .fetch_one(pool)
    .await
    .context("failed to upsert session")?;

    Ok(Reconciled {
        entity: row.session,
        created: row.created,
    })
}

/// Create sessions that do not exist yet, leaving existing rows alone.
pub async fn ensure_exist<'e, E>(executor: E, sessions: &[Session]) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    if sessions.is_empty() {
        return Ok(());
    }
    let numbers: Vec<i32> = sessions.iter().map(|s| s.number).collect();
    let starts: Vec<_> = sessions.iter().map(|s| s.start_date).collect();
    let ends: Vec<_> = sessions.iter().map(|s| s.end_date).collect();

    sqlx::query(
        r#"
        INSERT INTO sessions (number, start_date, end_date)
        SELECT * FROM UNNEST($1::int4[], $2::date[], $3::date[])
        ON CONFLICT (number) DO NOTHING
        "#,
    )
    .bind(&numbers)
    .bind(&starts)
    .bind(&ends)
    .execute(executor)
    .await
    .context("failed to ensure sessions exist")?;
    Ok(())
}

pub async fn list(pool: &PgPool) -> Result<Vec<Session>> {
    sqlx::query_as::<_, Session>("SELECT number, start_date, end_date FROM sessions ORDER BY number DESC")
        .fetch_all(pool)
        .await
        .context("failed to list sessions")
}

pub async fn get(pool: &PgPool, number: i32) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT number, start_date, end_date FROM sessions WHERE number = $1")
        .bind(number)
        .fetch_optional(pool)
        .await
        .context("failed to fetch session")
}
