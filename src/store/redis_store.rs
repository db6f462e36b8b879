//! Redis Store Module
//!
//! `CachePort` backed by an external Redis server. Expiry is left entirely
//! to Redis; this adapter only translates the four port calls.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionInfo, IntoConnectionInfo};
use tracing::{info, trace};

use crate::config::RedisConfig;
use crate::error::StoreError;
use crate::store::{CachePort, StoredValue};

// == Redis Store ==
/// Handle to one Redis database.
///
/// Wraps a [`ConnectionManager`], which multiplexes every request over a
/// single connection and reconnects after failures. Cloning it is cheap.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    // == Constructor ==
    /// Connects to the server described by `config`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let info = connection_info(config)?;
        let client = redis::Client::open(info)?;
        let conn = ConnectionManager::new(client).await?;
        info!(
            address = %config.address,
            database = config.database,
            "Connected to Redis"
        );
        Ok(Self { conn })
    }
}

/// Builds connection parameters from `host:port`, database index and an
/// optional password.
fn connection_info(config: &RedisConfig) -> Result<ConnectionInfo, StoreError> {
    let mut info = format!("redis://{}", config.address).into_connection_info()?;
    info.redis.db = config.database;
    if !config.password.is_empty() {
        info.redis.password = Some(config.password.clone());
    }
    Ok(info)
}

/// Translates a `TTL` reply: -1 (no expiry) and -2 (no key) both map to zero.
fn remaining_ttl(reply: i64) -> Duration {
    u64::try_from(reply).map_or(Duration::ZERO, Duration::from_secs)
}

#[async_trait]
impl CachePort for RedisStore {
    // == Get ==
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let mut conn = self.conn.clone();
        let (value, ttl): (Option<String>, i64) = redis::pipe()
            .atomic()
            .get(key)
            .ttl(key)
            .query_async(&mut conn)
            .await?;

        trace!(key, hit = value.is_some(), ttl, "GET+TTL");
        Ok(value.map(|value| StoredValue {
            value,
            ttl: remaining_ttl(ttl),
        }))
    }

    // == Set ==
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, value).await?;
        } else {
            conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
        }
        Ok(())
    }

    // == Exists ==
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    // == Count ==
    async fn count(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let count: usize = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ConnectionAddr;

    fn config(address: &str, password: &str, database: i64) -> RedisConfig {
        RedisConfig {
            address: address.to_string(),
            password: password.to_string(),
            database,
        }
    }

    #[test]
    fn test_connection_info_from_config() {
        let info = connection_info(&config("10.0.0.5:6380", "s3cret", 2)).unwrap();

        match &info.addr {
            ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "10.0.0.5");
                assert_eq!(*port, 6380);
            }
            other => panic!("unexpected address {other:?}"),
        }
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_connection_info_without_password() {
        let info = connection_info(&RedisConfig::default()).unwrap();
        assert_eq!(info.redis.db, 0);
        assert!(info.redis.password.is_none());
    }

    #[test]
    fn test_remaining_ttl() {
        assert_eq!(remaining_ttl(42), Duration::from_secs(42));
        assert_eq!(remaining_ttl(0), Duration::ZERO);
        assert_eq!(remaining_ttl(-1), Duration::ZERO);
        assert_eq!(remaining_ttl(-2), Duration::ZERO);
    }

    /// Runs against a live server: `BUCKETD_TEST_REDIS=127.0.0.1:6379 cargo test -- --ignored`.
    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_port_against_live_redis() {
        let address =
            std::env::var("BUCKETD_TEST_REDIS").unwrap_or_else(|_| "127.0.0.1:6379".to_string());
        let store: Box<dyn CachePort> =
            Box::new(RedisStore::connect(&config(&address, "", 15)).await.unwrap());

        let key = format!("bucketd-test-{}", std::process::id());
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(!store.exists(&key).await.unwrap());

        let before = store.count().await.unwrap();
        store.set(&key, "hello", Duration::from_secs(30)).await.unwrap();
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.value, "hello");
        assert!(stored.ttl_seconds() > 0 && stored.ttl_seconds() <= 30);
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.count().await.unwrap(), before + 1);

        // zero TTL persists without expiry
        store.set(&key, "forever", Duration::ZERO).await.unwrap();
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.value, "forever");
        assert_eq!(stored.ttl, Duration::ZERO);

        store.set(&key, "gone", Duration::from_secs(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
