use crate::ingest::{Ingest, TaskName};
use crate::utils::fmt_duration;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

/// How often sessions, members, and pending enrichment are refreshed (24 hours).
pub const REFERENCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// How often recently updated bills are pulled (15 minutes).
pub const BILLS_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// How often the daily record is checked (6 hours).
pub const RECORD_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// How long in-flight work gets to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// app_kv keys for persisting scheduler timestamps across restarts.
pub const KV_REFERENCE: &str = "scheduler.reference";
pub const KV_BILLS: &str = "scheduler.bills";
pub const KV_RECORD: &str = "scheduler.record";

#[derive(Debug, Clone, Copy)]
pub struct TaskIntervals {
    pub reference: Duration,
    pub bills: Duration,
    pub record: Duration,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            reference: REFERENCE_INTERVAL,
            bills: BILLS_INTERVAL,
            record: RECORD_INTERVAL,
        }
    }
}

pub fn kv_key(task: TaskName) -> &'static str {
    match task {
        TaskName::Reference => KV_REFERENCE,
        TaskName::Bills => KV_BILLS,
        TaskName::Record => KV_RECORD,
    }
}

/// Convert a persisted UTC timestamp to an `Instant`, preserving remaining cooldown.
///
/// `None` means the task is due now: it never ran, or ran longer than
/// `interval` ago. Otherwise the returned `Instant` reflects how much time has
/// actually elapsed so the scheduler respects the remaining cooldown.
fn persisted_to_instant(persisted: Option<DateTime<Utc>>, interval: Duration) -> Option<Instant> {
    let elapsed = (Utc::now() - persisted?).to_std().ok()?;
    if elapsed >= interval {
        return None;
    }
    Instant::now().checked_sub(elapsed)
}

struct ScheduledTask {
    name: TaskName,
    interval: Duration,
    last_run: Option<Instant>,
    running: Option<tokio::task::JoinHandle<()>>,
}

impl ScheduledTask {
    fn is_due(&self) -> bool {
        self.last_run.is_none_or(|last| last.elapsed() >= self.interval)
    }

    fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

/// Runs each ingestion task on its own interval.
pub struct Scheduler {
    ingest: Arc<Ingest>,
    intervals: TaskIntervals,
}

impl Scheduler {
    pub fn new(ingest: Arc<Ingest>, intervals: TaskIntervals) -> Self {
        Self { ingest, intervals }
    }

    /// Runs the scheduler's main loop with graceful shutdown support.
    ///
    /// The scheduler wakes up every 60 seconds and spawns whichever tasks are
    /// due. A task whose previous run is still going is skipped for that
    /// cycle. When a shutdown signal is received all in-flight work is
    /// cancelled and given up to 5 seconds before it is abandoned.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Scheduler service started");

        let work_interval = Duration::from_secs(60);
        let mut next_run = time::Instant::now();
        let cancel_token = CancellationToken::new();

        let mut tasks = Vec::new();
        for (name, interval) in [
            (TaskName::Reference, self.intervals.reference),
            (TaskName::Bills, self.intervals.bills),
            (TaskName::Record, self.intervals.record),
        ] {
            // Load persisted timestamps so we don't redo work that completed recently.
            let persisted = self
                .ingest
                .store
                .get_timestamp(kv_key(name))
                .await
                .unwrap_or(None);
            if let Some(ts) = persisted {
                info!(task = name.as_str(), last_run = %ts, "Loaded persisted scheduler timestamp");
            }
            tasks.push(ScheduledTask {
                name,
                interval,
                last_run: persisted_to_instant(persisted, interval),
                running: None,
            });
        }

        loop {
            tokio::select! {
                _ = time::sleep_until(next_run) => {
                    for task in tasks.iter_mut() {
                        if !task.is_due() {
                            continue;
                        }
                        if task.is_running() {
                            trace!(task = task.name.as_str(), "Previous run still in progress, skipping");
                            continue;
                        }

                        // Mark now so a slow run isn't re-triggered; the DB
                        // timestamp is only written on success.
                        task.last_run = Some(Instant::now());
                        task.running = Some(tokio::spawn({
                            let ingest = self.ingest.clone();
                            let cancel_token = cancel_token.clone();
                            let name = task.name;
                            async move {
                                tokio::select! {
                                    _ = Self::run_one(&ingest, name) => {}
                                    _ = cancel_token.cancelled() => {
                                        trace!(task = name.as_str(), "Scheduled task cancelled gracefully");
                                    }
                                }
                            }
                        }));
                    }

                    next_run = time::Instant::now() + work_interval;
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler received shutdown signal");
                    cancel_token.cancel();

                    let handles: Vec<_> = tasks.iter_mut().filter_map(|t| t.running.take()).collect();
                    if !handles.is_empty() {
                        let all = futures::future::join_all(handles);
                        if tokio::time::timeout(SHUTDOWN_GRACE, all).await.is_err() {
                            warn!("Scheduled work did not complete within 5s, abandoning");
                        } else {
                            trace!("Scheduled work completed gracefully");
                        }
                    }

                    info!("Scheduler exiting gracefully");
                    break;
                }
            }
        }
    }

    async fn run_one(ingest: &Ingest, task: TaskName) {
        let start = Instant::now();
        info!(task = task.as_str(), "Scheduled task starting");

        match ingest.run_task(task, false).await {
            Ok(()) => {
                info!(
                    task = task.as_str(),
                    duration = fmt_duration(start.elapsed()),
                    "Scheduled task finished"
                );
                if let Err(e) = ingest.store.set_timestamp(kv_key(task), Utc::now()).await {
                    warn!(task = task.as_str(), error = ?e, "Failed to persist task timestamp");
                }
            }
            Err(e) => error!(task = task.as_str(), error = ?e, "Scheduled task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_to_instant_never_run_is_due() {
        assert!(persisted_to_instant(None, Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_persisted_to_instant_keeps_remaining_cooldown() {
        let ts = Utc::now() - chrono::Duration::minutes(10);
        let instant = persisted_to_instant(Some(ts), Duration::from_secs(3600)).unwrap();
        let elapsed = instant.elapsed();
        assert!(elapsed >= Duration::from_secs(599));
        assert!(elapsed < Duration::from_secs(3600));
    }

    #[test]
    fn test_persisted_to_instant_stale_timestamp_is_due() {
        let ts = Utc::now() - chrono::Duration::days(3);
        assert!(persisted_to_instant(Some(ts), Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn test_is_due() {
        let fresh = ScheduledTask {
            name: TaskName::Bills,
            interval: Duration::from_secs(900),
            last_run: Some(Instant::now()),
            running: None,
        };
        assert!(!fresh.is_due());

        let never = ScheduledTask {
            last_run: None,
            ..fresh
        };
        assert!(never.is_due());
    }

    #[test]
    fn test_kv_keys_are_distinct() {
        let keys = [
            kv_key(TaskName::Reference),
            kv_key(TaskName::Bills),
            kv_key(TaskName::Record),
        ];
        assert_eq!(keys, ["scheduler.reference", "scheduler.bills", "scheduler.record"]);
    }
}
