//! Storage seam used by the ingestion pipeline.
//!
//! Every write is an idempotent reconcile keyed on a natural key: applying
//! the same input twice leaves one row, and `last_updated`/`updated_at` only
//! move when a stored field actually changes. Activity counters on
//! memberships never decrease.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

use crate::data::models::{
    Bill, BillKey, BillRecord, DailyRecord, DailyRecordInput, Member, MemberDetail,
    MemberEnrichment, MemberRecord, Membership, Reconciled, Session,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn reconcile_session(&self, session: &Session) -> Result<Reconciled<Session>>;

    async fn sessions(&self) -> Result<Vec<Session>>;

    async fn reconcile_member(&self, record: &MemberRecord) -> Result<Reconciled<Member>>;

    async fn member(&self, bioguide_id: &str) -> Result<Option<Member>>;

    /// Members whose details or memberships have not been fully recorded.
    async fn members_pending_enrichment(&self) -> Result<Vec<Member>>;

    /// Records details and memberships for a member and marks it fully
    /// processed. Sessions referenced by a membership are created if missing.
    async fn record_enrichment(&self, member_id: i32, enrichment: &MemberEnrichment) -> Result<()>;

    async fn member_detail(&self, member_id: i32) -> Result<Option<MemberDetail>>;

    async fn memberships(&self, member_id: i32) -> Result<Vec<Membership>>;

    /// Clears `fully_processed` on members with any membership whose
    /// sponsored or cosponsored count is zero. Returns how many were cleared.
    async fn clear_incomplete_members(&self) -> Result<u64>;

    async fn find_bill(&self, key: &BillKey) -> Result<Option<Bill>>;

    async fn reconcile_bill(&self, record: &BillRecord) -> Result<Reconciled<Bill>>;

    /// Bills ordered by latest action, newest first.
    async fn recent_bills(&self, limit: i64) -> Result<Vec<Bill>>;

    async fn daily_record(&self, issue_date: NaiveDate) -> Result<Option<DailyRecord>>;

    /// Inserts a record for a new issue date; an existing one is returned untouched.
    async fn insert_daily_record(&self, input: &DailyRecordInput) -> Result<Reconciled<DailyRecord>>;

    async fn kv_get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value, optionally expiring after `ttl`.
    async fn kv_set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// The stored session containing `today`, or one derived from the date.
    async fn current_session(&self, today: NaiveDate) -> Result<Session> {
        let sessions = self.sessions().await?;
        Ok(sessions
            .into_iter()
            .find(|s| s.contains(today))
            .unwrap_or_else(|| Session::derived(Session::number_for_date(today))))
    }

    /// Retrieve a persisted UTC timestamp, or `None` if absent or unparseable.
    async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let value = self.kv_get(key).await?;
        Ok(value.and_then(|v| DateTime::parse_from_rfc3339(&v).ok().map(|dt| dt.to_utc())))
    }

    /// Persist a UTC timestamp under the given key.
    async fn set_timestamp(&self, key: &str, ts: DateTime<Utc>) -> Result<()> {
        self.kv_set(key, &ts.to_rfc3339(), None).await
    }
}
