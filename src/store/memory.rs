//! In-process Store Module
//!
//! HashMap-backed engine with per-entry TTL expiry, used as the default
//! `CachePort` implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::StoreError;
use crate::store::entry::current_timestamp_ms;
use crate::store::{CacheEntry, CachePort, StoredValue};

// == Memory Store ==
/// Key/value storage shared by every request handler.
///
/// Expired entries are treated as absent on read and are purged either
/// lazily by the read that finds them or by the periodic sweeper.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    // == Length ==
    /// Number of stored entries, including ones that lapsed since the last sweep.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn purge(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
            trace!(key, "purged expired entry on read");
        }
    }
}

#[async_trait]
impl CachePort for MemoryStore {
    // == Get ==
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let found = {
            let entries = self.entries.read().await;
            entries.get(key).map(|entry| {
                if entry.is_expired() {
                    None
                } else {
                    Some(StoredValue {
                        value: entry.value.clone(),
                        ttl: entry.ttl_remaining(),
                    })
                }
            })
        };

        match found {
            Some(Some(stored)) => Ok(Some(stored)),
            Some(None) => {
                self.purge(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    // == Set ==
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let entry = CacheEntry::new(value.to_string(), ttl);
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    // == Exists ==
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    // == Count ==
    async fn count(&self) -> Result<usize, StoreError> {
        let now = current_timestamp_ms();
        let entries = self.entries.read().await;
        Ok(entries.values().filter(|entry| !entry.is_expired_at(now)).count())
    }
}
