//! Key-value store backends for the gates: Redis, or in-process for tests.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Scheme accepted in `REDIS_URL` to select the in-process store.
pub const MEMORY_URL: &str = "memory://";

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type KvResult<T> = Result<T, KvError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Set `key` unconditionally with an expiry.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Atomically set `key` only if it is absent. Returns whether it was set.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    /// Increment the integer at `key`, creating it at 1.
    async fn incr(&self, key: &str) -> KvResult<i64>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool>;

    /// Returns whether a key was removed.
    async fn del(&self, key: &str) -> KvResult<bool>;

    async fn ping(&self) -> KvResult<()>;
}

/// Build the store named by `url`: `memory://` for the in-process store,
/// anything else is handed to the redis client. Empty means no store.
pub async fn connect(url: &str) -> KvResult<Option<Arc<dyn KvStore>>> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    if url == MEMORY_URL {
        return Ok(Some(Arc::new(MemoryStore::new())));
    }
    let store = RedisStore::connect(url).await?;
    Ok(Some(Arc::new(store)))
}

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> KvResult<Self> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.connection.clone();
        let reply = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        let mut conn = self.connection.clone();
        let count = redis::cmd("INCR")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        let mut conn = self.connection.clone();
        let applied = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(applied == 1)
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.connection.clone();
        let deleted = redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process store. Expiry runs on the tokio clock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> KvResult<T>,
    ) -> KvResult<T> {
        let mut entries = self.entries.lock().map_err(|_| KvError::Poisoned)?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        f(&mut entries, now)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.with_entries(|entries, _| Ok(entries.get(key).map(|e| e.value.clone())))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.with_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + ttl),
                },
            );
            Ok(())
        })
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        self.with_entries(|entries, now| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + ttl),
                },
            );
            Ok(true)
        })
    }

    async fn incr(&self, key: &str) -> KvResult<i64> {
        self.with_entries(|entries, _| {
            let entry = entries.entry(key.to_string()).or_insert(Entry {
                value: "0".to_string(),
                expires_at: None,
            });
            let current: i64 = entry
                .value
                .parse()
                .map_err(|_| KvError::NotAnInteger(key.to_string()))?;
            let next = current + 1;
            entry.value = next.to_string();
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KvResult<bool> {
        self.with_entries(|entries, now| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn del(&self, key: &str) -> KvResult<bool> {
        self.with_entries(|entries, _| Ok(entries.remove(key).is_some()))
    }

    async fn ping(&self) -> KvResult<()> {
        self.with_entries(|_, _| Ok(()))
    }
}
