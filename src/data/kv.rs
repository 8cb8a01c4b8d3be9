//! Generic key-value persistence for application state across restarts.
//!
//! Backed by the `app_kv` UNLOGGED table. Used for scheduler timestamps, the
//! bill window cursor, and hashed cache slots: state that should survive
//! normal restarts but is safe to lose on DB crash recovery.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;

/// Retrieve a value by key, or `None` if absent or expired.
pub async fn get(pool: &PgPool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT value FROM app_kv WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Insert or update a key-value pair, optionally expiring after `ttl`.
pub async fn set(
    pool: &PgPool,
    key: &str,
    value: &str,
    ttl: Option<Duration>,
) -> Result<(), sqlx::Error> {
    let expires_at: Option<DateTime<Utc>> = ttl
        .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        .map(|ttl| Utc::now() + ttl);

    sqlx::query(
        r#"
        INSERT INTO app_kv (key, value, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (key)
        DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at, updated_at = now()
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}
