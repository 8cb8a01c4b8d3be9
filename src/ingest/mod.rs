//! Ingestion pipeline: reference sync, bills, and the daily record.

pub mod bills;
pub mod fan_out;
pub mod record;
pub mod reference;
pub mod scheduler;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::congress::CongressApi;
use crate::data::Store;
use crate::summarizer::PacedSummarizer;

pub use scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub member_workers: usize,
    pub bill_workers: usize,
    /// How far back the first bills run looks when no cursor is stored.
    pub bills_lookback: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            member_workers: 10,
            bill_workers: 4,
            bills_lookback: Duration::from_secs(15 * 60),
        }
    }
}

/// Tasks that can run on a schedule or on demand.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskName {
    /// Sessions, the member directory, and member enrichment.
    Reference,
    /// Recently updated bills and the recent-bills cache.
    Bills,
    /// The latest daily Congressional Record digest.
    Record,
}

impl TaskName {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::Reference => "reference",
            TaskName::Bills => "bills",
            TaskName::Record => "record",
        }
    }
}

/// Everything an ingestion task needs, shared across tasks.
pub struct Ingest {
    pub api: Arc<CongressApi>,
    pub store: Arc<dyn Store>,
    pub summarizer: Arc<PacedSummarizer>,
    pub settings: IngestSettings,
}

impl Ingest {
    pub fn new(
        api: Arc<CongressApi>,
        store: Arc<dyn Store>,
        summarizer: Arc<PacedSummarizer>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            api,
            store,
            summarizer,
            settings,
        }
    }

    /// Runs one task to completion. `force` only affects the bills task,
    /// where it rewrites the recent-bills cache even when unchanged.
    pub async fn run_task(&self, task: TaskName, force: bool) -> Result<()> {
        match task {
            TaskName::Reference => self.run_reference().await,
            TaskName::Bills => bills::refresh_bills(self, Utc::now(), force).await.map(|_| ()),
            TaskName::Record => record::refresh_daily_record(self).await.map(|_| ()),
        }
    }

    /// Sessions first so memberships can reference them, then members, then
    /// enrichment of whoever is still pending.
    pub async fn run_reference(&self) -> Result<()> {
        let store = self.store.as_ref();
        reference::sync_sessions(&self.api, store).await?;
        reference::sync_members(&self.api, store).await?;
        reference::enrich_pending(&self.api, store, self.settings.member_workers).await?;
        Ok(())
    }

    /// Clears completion on members with a zero activity count so the next
    /// reference run enriches them again.
    pub async fn sweep(&self) -> Result<u64> {
        let cleared = self.store.clear_incomplete_members().await?;
        info!(cleared, "maintenance sweep completed");
        Ok(cleared)
    }
}
