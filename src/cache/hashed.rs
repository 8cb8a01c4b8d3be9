//! Change-detecting single-slot cache on top of the store's key-value table.
//!
//! Each slot keeps the serialized payload under `key` and a SHA-256 of it
//! under `{key}:hash`. A refresh with an identical payload is a no-op unless
//! forced or the payload has expired.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

use crate::data::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRefresh {
    Updated,
    Unchanged,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn hash_key(key: &str) -> String {
    format!("{key}:hash")
}

pub struct HashedCache<'a> {
    store: &'a dyn Store,
}

impl<'a> HashedCache<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.kv_get(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("cached value under '{key}' is not valid"))?;
        Ok(Some(value))
    }

    /// Writes `payload` if its hash differs from the stored one, the slot is
    /// empty, or `force` is set.
    pub async fn refresh<T: Serialize + Sync>(
        &self,
        key: &str,
        payload: &T,
        ttl: Option<Duration>,
        force: bool,
    ) -> Result<CacheRefresh> {
        let serialized = serde_json::to_string(payload).context("failed to serialize cache payload")?;
        let digest = sha256_hex(serialized.as_bytes());

        if !force {
            let stored_hash = self.store.kv_get(&hash_key(key)).await?;
            if stored_hash.as_deref() == Some(digest.as_str()) && self.store.kv_get(key).await?.is_some() {
                debug!(key, "cache payload unchanged");
                return Ok(CacheRefresh::Unchanged);
            }
        }

        self.store.kv_set(key, &serialized, ttl).await?;
        self.store.kv_set(&hash_key(key), &digest, ttl).await?;
        info!(key, force, bytes = serialized.len(), "cache slot updated");
        Ok(CacheRefresh::Updated)
    }
}
