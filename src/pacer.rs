//! Client-side pacing for quota-limited upstream services.
//!
//! A [`Pacer`] enforces a minimum spacing between calls (with an optional
//! burst allowance) and owns the cooldown applied when the upstream reports
//! that its quota is exhausted. Each upstream gets its own pacer, shared by
//! every task that talks to it.

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{trace, warn};

use crate::utils::fmt_duration;

/// Quota description for a single upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerSettings {
    /// Calls allowed per `interval`.
    pub max_calls: NonZeroU32,
    pub interval: Duration,
    /// Calls that may be issued back-to-back before spacing applies.
    pub burst: NonZeroU32,
    /// Pause applied when the upstream reports exhaustion without a hint.
    pub cooldown: Duration,
}

impl PacerSettings {
    pub fn per_hour(calls: NonZeroU32, burst: NonZeroU32, cooldown: Duration) -> Self {
        Self {
            max_calls: calls,
            interval: Duration::from_secs(60 * 60),
            burst,
            cooldown,
        }
    }

    /// Strict per-minute spacing with no burst.
    pub fn per_minute(calls: NonZeroU32, cooldown: Duration) -> Self {
        Self {
            max_calls: calls,
            interval: Duration::from_secs(60),
            burst: NonZeroU32::MIN,
            cooldown,
        }
    }

    /// Minimum time between two consecutive calls once the burst is spent.
    pub fn min_spacing(&self) -> Duration {
        self.interval / self.max_calls.get()
    }
}

pub struct Pacer {
    name: &'static str,
    limiter: DefaultDirectRateLimiter,
    cooldown: Duration,
}

impl Pacer {
    pub fn new(name: &'static str, settings: PacerSettings) -> Result<Self> {
        let spacing = settings.min_spacing();
        let quota = Quota::with_period(spacing)
            .with_context(|| format!("{name} pacer spacing must be non-zero"))?
            .allow_burst(settings.burst);

        trace!(
            pacer = name,
            spacing = fmt_duration(spacing),
            burst = settings.burst.get(),
            "pacer configured"
        );

        Ok(Self {
            name,
            limiter: RateLimiter::direct(quota),
            cooldown: settings.cooldown,
        })
    }

    /// Waits until the next call is permitted.
    pub async fn ready(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        trace!(pacer = self.name, "pacing call");
        self.limiter.until_ready().await;
    }

    /// Blocks for the upstream's advertised wait, or the configured cooldown
    /// when no hint was given. Returns the time actually waited.
    pub async fn cool_down(&self, hint: Option<Duration>) -> Duration {
        let wait = hint.unwrap_or(self.cooldown);
        warn!(
            pacer = self.name,
            wait = fmt_duration(wait),
            hinted = hint.is_some(),
            "upstream quota exhausted, cooling down"
        );
        tokio::time::sleep(wait).await;
        wait
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn nz(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_min_spacing_per_minute() {
        let settings = PacerSettings::per_minute(nz(15), Duration::from_secs(60));
        assert_eq!(settings.min_spacing(), Duration::from_secs(4));
        assert_eq!(settings.burst.get(), 1);
    }

    #[test]
    fn test_min_spacing_per_hour() {
        let settings = PacerSettings::per_hour(nz(5000), nz(10), Duration::from_secs(60));
        assert_eq!(settings.min_spacing(), Duration::from_millis(720));
    }

    #[tokio::test]
    async fn test_ready_spaces_calls() {
        let settings = PacerSettings {
            max_calls: nz(20),
            interval: Duration::from_secs(1),
            burst: nz(1),
            cooldown: Duration::from_secs(1),
        };
        let pacer = Pacer::new("test", settings).unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            pacer.ready().await;
        }
        // First call is free, the next two each wait one 50ms slot.
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_burst_is_not_delayed() {
        let settings = PacerSettings {
            max_calls: nz(1),
            interval: Duration::from_secs(60),
            burst: nz(5),
            cooldown: Duration::from_secs(1),
        };
        let pacer = Pacer::new("test", settings).unwrap();

        let start = Instant::now();
        for _ in 0..5 {
            pacer.ready().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cool_down_prefers_hint() {
        let settings = PacerSettings::per_minute(nz(60), Duration::from_secs(60));
        let pacer = Pacer::new("test", settings).unwrap();

        let start = tokio::time::Instant::now();
        let waited = pacer.cool_down(Some(Duration::from_secs(5))).await;
        assert_eq!(waited, Duration::from_secs(5));
        assert!(start.elapsed() >= Duration::from_secs(5));

        let waited = pacer.cool_down(None).await;
        assert_eq!(waited, Duration::from_secs(60));
    }
}
