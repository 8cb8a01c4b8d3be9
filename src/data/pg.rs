//! PostgreSQL-backed [`Store`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::data::models::{
    Bill, BillKey, BillRecord, DailyRecord, DailyRecordInput, Member, MemberDetail,
    MemberEnrichment, MemberRecord, Membership, Reconciled, Session,
};
use crate::data::store::Store;
use crate::data::{bills, kv, members, records, sessions};
use crate::utils::fmt_duration;

const SLOW_WRITE_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn reconcile_session(&self, session: &Session) -> Result<Reconciled<Session>> {
        sessions::upsert(&self.pool, session).await
    }

    async fn sessions(&self) -> Result<Vec<Session>> {
        sessions::list(&self.pool).await
    }

    async fn reconcile_member(&self, record: &MemberRecord) -> Result<Reconciled<Member>> {
        members::upsert(&self.pool, record).await
    }

    async fn member(&self, bioguide_id: &str) -> Result<Option<Member>> {
        members::get_by_bioguide(&self.pool, bioguide_id).await
    }

    async fn members_pending_enrichment(&self) -> Result<Vec<Member>> {
        members::pending_enrichment(&self.pool).await
    }

    async fn record_enrichment(&self, member_id: i32, enrichment: &MemberEnrichment) -> Result<()> {
        let start = Instant::now();
        members::record_enrichment(&self.pool, member_id, enrichment).await?;
        let elapsed = start.elapsed();
        if elapsed > SLOW_WRITE_THRESHOLD {
            warn!(
                member_id,
                memberships = enrichment.memberships.len(),
                duration = fmt_duration(elapsed),
                "Slow write: record_enrichment"
            );
        }
        Ok(())
    }

    async fn member_detail(&self, member_id: i32) -> Result<Option<MemberDetail>> {
        members::get_detail(&self.pool, member_id).await
    }

    async fn memberships(&self, member_id: i32) -> Result<Vec<Membership>> {
        members::get_memberships(&self.pool, member_id).await
    }

    async fn clear_incomplete_members(&self) -> Result<u64> {
        members::clear_incomplete(&self.pool).await
    }

    async fn find_bill(&self, key: &BillKey) -> Result<Option<Bill>> {
        bills::find(&self.pool, key).await
    }

    async fn reconcile_bill(&self, record: &BillRecord) -> Result<Reconciled<Bill>> {
        bills::upsert(&self.pool, record).await
    }

    async fn recent_bills(&self, limit: i64) -> Result<Vec<Bill>> {
        bills::recent(&self.pool, limit).await
    }

    async fn daily_record(&self, issue_date: NaiveDate) -> Result<Option<DailyRecord>> {
        records::get(&self.pool, issue_date).await
    }

    async fn insert_daily_record(&self, input: &DailyRecordInput) -> Result<Reconciled<DailyRecord>> {
        records::insert(&self.pool, input).await
    }

    async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(kv::get(&self.pool, key).await?)
    }

    async fn kv_set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        Ok(kv::set(&self.pool, key, value, ttl).await?)
    }
}
