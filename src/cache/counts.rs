//! Short-lived memory of upstream listing totals, keyed per session.
//!
//! Listing pages beyond the true end come back empty, so the real count is
//! remembered once observed and used to clamp later page requests.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::congress::Listing;

pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct PageCountCache {
    ttl: Duration,
    max_entries: usize,
    /// (session, listing) → (observed_at, count)
    entries: Arc<DashMap<(i32, Listing), (Instant, u64)>>,
}

impl Default for PageCountCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl PageCountCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, session: i32, listing: Listing) -> Option<u64> {
        let key = (session, listing);
        let fresh = self.entries.get(&key).and_then(|entry| {
            let (observed_at, count) = *entry;
            (observed_at.elapsed() < self.ttl).then_some(count)
        });
        if fresh.is_none() {
            self.entries.remove_if(&key, |_, (observed_at, _)| observed_at.elapsed() >= self.ttl);
        }
        fresh
    }

    pub fn insert(&self, session: i32, listing: Listing, count: u64) {
        self.entries
            .retain(|_, (observed_at, _)| observed_at.elapsed() < self.ttl);
        let key = (session, listing);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().0)
                .map(|entry| *entry.key());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
                debug!(session = victim.0, listing = victim.1.as_str(), "evicted page count");
            }
        }
        self.entries.insert(key, (Instant::now(), count));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
