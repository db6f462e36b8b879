//! Cache Port
//!
//! The narrow capability both front-ends use to reach the backing store.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// A value read back from the store together with its remaining lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    /// Remaining time to live; zero when the entry has no expiry.
    pub ttl: Duration,
}

impl StoredValue {
    /// Remaining lifetime in whole seconds, truncated.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }
}

/// Backing key/value engine with its own TTL expiry.
///
/// Implementations must be safe to share across concurrently running
/// request handlers; the core never adds locking around these calls.
#[async_trait]
pub trait CachePort: Send + Sync {
    /// Looks up `key`, returning `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    /// A zero `ttl` stores the value without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Number of live entries.
    async fn count(&self) -> Result<usize, StoreError>;
}
