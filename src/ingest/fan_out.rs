//! Bounded-concurrency map over a worklist where one key's failure never
//! fails the batch.

use futures::StreamExt;
use futures::stream;
use std::fmt::Display;
use std::future::Future;
use tracing::warn;

#[derive(Debug)]
pub struct FanOut<K, T> {
    pub succeeded: Vec<(K, T)>,
    pub failed: Vec<(K, anyhow::Error)>,
}

impl<K, T> FanOut<K, T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs `f` over every key with at most `workers` futures in flight.
///
/// Results arrive in completion order. Each failure is logged once here and
/// returned alongside its key.
pub async fn fan_out<K, T, F, Fut>(keys: Vec<K>, workers: usize, label: &str, f: F) -> FanOut<K, T>
where
    K: Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut results = stream::iter(keys)
        .map(|key| {
            let fut = f(key.clone());
            async move { (key, fut.await) }
        })
        .buffer_unordered(workers.max(1));

    let mut outcome = FanOut {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    while let Some((key, result)) = results.next().await {
        match result {
            Ok(value) => outcome.succeeded.push((key, value)),
            Err(e) => {
                warn!(%key, task = label, error = format!("{e:#}"), "item failed, skipping");
                outcome.failed.push((key, e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;

    /// Counts WARN events seen while installed as the thread's subscriber.
    #[derive(Clone, Default)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_one_failing_key_is_logged_once() {
        let warnings = WarnCounter::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(warnings.clone()),
        );

        let keys: Vec<u32> = (1..=5).collect();
        let outcome = fan_out(keys, 2, "member", |k| async move {
            if k == 3 {
                anyhow::bail!("detail for key {k} is malformed");
            }
            Ok(k * 10)
        })
        .await;

        let mut ok: Vec<u32> = outcome.succeeded.iter().map(|(_, v)| *v).collect();
        ok.sort();
        assert_eq!(ok, vec![10, 20, 40, 50]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, 3);
        assert_eq!(outcome.total(), 5);
        assert_eq!(warnings.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_failure_is_returned() {
        let keys: Vec<u32> = (1..=6).collect();
        let outcome = fan_out(keys, 3, "test", |k| async move {
            if k % 3 == 0 {
                anyhow::bail!("key {k} is malformed");
            }
            Ok(k)
        })
        .await;

        let mut failed: Vec<u32> = outcome.failed.iter().map(|(k, _)| *k).collect();
        failed.sort();
        assert_eq!(failed, vec![3, 6]);
        assert_eq!(outcome.succeeded.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let outcome = fan_out((0..20).collect::<Vec<u32>>(), 4, "test", |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert_eq!(outcome.succeeded.len(), 20);
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_workers_still_runs() {
        let outcome = fan_out(vec![1u8, 2], 0, "test", |k| async move { Ok(k) }).await;
        assert_eq!(outcome.succeeded.len(), 2);
    }
}
