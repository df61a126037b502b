use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors that can occur with key-value operations
#[derive(Debug, Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Key-value store handed to components instead of ambient globals
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Store `value`; `ttl = None` keeps it until deleted
    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), KvError>;

    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Atomically add one to an integer counter, returning the new value
    async fn increment(&self, key: &str) -> Result<i64, KvError>;

    /// Current value of a counter; missing counters read as 0
    async fn read_counter(&self, key: &str) -> Result<i64, KvError> {
        Ok(self
            .get_raw(key)
            .await?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0))
    }
}

/// Read a JSON value
pub async fn get_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>, KvError>
where
    T: for<'de> Deserialize<'de>,
{
    match store.get_raw(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Write a JSON value
pub async fn set_json<T>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), KvError>
where
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    store.set_raw(key, json, ttl).await
}

/// Two-tier store
///
/// L1 is an in-process moka cache with a short TTL, L2 is Redis and is the
/// source of truth shared across instances. Counters bypass L1.
pub struct RedisStore {
    redis: Arc<Mutex<ConnectionManager>>,
    l1_cache: moka::future::Cache<String, String>,
}

impl RedisStore {
    /// Create a new two-tier store
    pub async fn new(redis_url: &str, l1_size: u64, l1_ttl_secs: u64) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(l1_ttl_secs))
            .build();

        Ok(Self {
            redis: Arc::new(Mutex::new(redis)),
            l1_cache,
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, KvError> {
        if let Some(value) = self.l1_cache.get(key).await {
            tracing::trace!("L1 hit: {}", key);
            return Ok(Some(value));
        }

        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        if let Some(json) = &value {
            tracing::trace!("L2 hit: {}", key);
            self.l1_cache.insert(key.to_string(), json.clone()).await;
        }

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), KvError> {
        self.l1_cache.insert(key.to_string(), value.clone()).await;

        let mut conn = self.redis.lock().await;
        match ttl {
            Some(ttl) => {
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(ttl.as_secs().max(1))
                    .arg(value)
                    .query_async::<()>(&mut *conn)
                    .await?
            }
            None => {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async::<()>(&mut *conn)
                    .await?
            }
        }

        tracing::trace!("Set: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.l1_cache.invalidate(key).await;
        let mut conn = self.redis.lock().await;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        self.l1_cache.invalidate(key).await;
        let mut conn = self.redis.lock().await;
        let value: i64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn read_counter(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.redis.lock().await;
        let value: Option<i64> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(value.unwrap_or(0))
    }
}

/// Single-process store used when Redis is not configured
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut entries = self.entries.lock().await;
        let expired = matches!(entries.get(key), Some((_, Some(deadline))) if *deadline <= Instant::now());
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(v, _)| v.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), KvError> {
        let deadline = ttl.map(|t| Instant::now() + t);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        let mut entries = self.entries.lock().await;
        let current = entries
            .get(key)
            .and_then(|(v, _)| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        entries.insert(key.to_string(), (next.to_string(), None));
        Ok(next)
    }
}

/// Key builder
pub struct StoreKey;

impl StoreKey {
    /// Re-match counter for a startup
    pub fn rematch_count(startup_id: &str) -> String {
        format!("hotmatch_rematch_count_{}", startup_id)
    }

    /// Cached match listing for a startup at one listing generation
    pub fn matches(startup_id: &str, generation: i64) -> String {
        format!("matches:{}:{}", startup_id, generation)
    }

    /// Bumped whenever a run rewrites the startup's matches
    pub fn matches_generation(startup_id: &str) -> String {
        format!("matches_gen:{}", startup_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_redis_set_get() {
        let store = RedisStore::new("redis://127.0.0.1:6379", 1000, 60)
            .await
            .expect("Failed to create store");

        let key = "pythh_test_key";
        set_json(&store, key, &"test_value", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        let result: Option<String> = get_json(&store, key).await.unwrap();
        assert_eq!(result.as_deref(), Some("test_value"));

        store.delete(key).await.unwrap();
        assert!(store.get_raw(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_roundtrip_and_delete() {
        let store = MemoryStore::new();
        set_json(&store, "k", &vec![1, 2, 3], None).await.unwrap();

        let value: Option<Vec<i32>> = get_json(&store, "k").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        store.delete("k").await.unwrap();
        assert!(store.get_raw("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_ttl_expiry() {
        let store = MemoryStore::new();
        store
            .set_raw("k", "v".to_string(), Some(Duration::from_millis(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get_raw("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_increment() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("c").await.unwrap(), 1);
        assert_eq!(store.increment("c").await.unwrap(), 2);
        assert_eq!(store.get_raw("c").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.read_counter("c").await.unwrap(), 2);
        assert_eq!(store.read_counter("missing").await.unwrap(), 0);
    }

    #[test]
    fn test_key_builder() {
        assert_eq!(StoreKey::rematch_count("s1"), "hotmatch_rematch_count_s1");
        assert_eq!(StoreKey::matches("s1", 3), "matches:s1:3");
        assert_eq!(StoreKey::matches_generation("s1"), "matches_gen:s1");
    }
}
