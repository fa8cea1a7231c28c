//! Redis-backed cache store, event publisher and lock provider.
//!
//! All three share one auto-reconnecting `ConnectionManager`. Locks are
//! `SET NX PX` keys holding a per-holder token; release is a
//! compare-and-delete script.

use crate::lock::{LockLease, LockProvider};
use crate::store::{CacheStore, EventPublisher};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use shopdash_core::config::RedisConfig;
use shopdash_core::{ShopdashError, ShopdashResult};
use std::time::Duration;
use tracing::{debug, info};

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

fn cache_err(op: &'static str, e: redis::RedisError) -> ShopdashError {
    metrics::counter!("cache.errors", "op" => op).increment(1);
    ShopdashError::Cache(format!("{op}: {e}"))
}

fn lock_err(op: &'static str, e: redis::RedisError) -> ShopdashError {
    ShopdashError::Lock(format!("{op}: {e}"))
}

/// Shared Redis connection, constructed once at startup.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    url: String,
}

impl RedisBackend {
    /// Connect and verify with a PING.
    pub async fn connect(config: &RedisConfig) -> anyhow::Result<Self> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str())?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let mut conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| anyhow::anyhow!("timed out connecting to Redis after {timeout:?}"))??;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self {
            conn,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache_store(&self) -> RedisCacheStore {
        RedisCacheStore {
            conn: self.conn.clone(),
        }
    }

    pub fn lock_provider(&self) -> RedisLockProvider {
        RedisLockProvider {
            conn: self.conn.clone(),
            release: redis::Script::new(RELEASE_SCRIPT),
        }
    }
}

/// Cache store and publisher on plain Redis strings and PUBLISH.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> ShopdashResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| cache_err("get", e))
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> ShopdashResult<()> {
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| cache_err("set", e))?;
        debug!(key = %key, ttl_secs = ttl_secs, "cache set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShopdashResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| cache_err("del", e))
    }
}

#[async_trait]
impl EventPublisher for RedisCacheStore {
    async fn publish(&self, channel: &str, message: &str) -> ShopdashResult<()> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, message)
            .await
            .map_err(|e| cache_err("publish", e))
    }
}

/// Single-instance Redis lock. One attempt per call, no internal retry.
#[derive(Clone)]
pub struct RedisLockProvider {
    conn: ConnectionManager,
    release: redis::Script,
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    async fn try_acquire(&self, resource: &str, lease: Duration) -> ShopdashResult<Option<LockLease>> {
        let mut conn = self.conn.clone();
        let granted = LockLease::new(resource, lease);
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(resource)
            .arg(granted.token())
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| lock_err("acquire", e))?;

        Ok(reply.map(|_| granted))
    }

    async fn release(&self, lease: &LockLease) -> ShopdashResult<()> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .release
            .key(lease.resource())
            .arg(lease.token())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| lock_err("release", e))?;

        if removed == 1 {
            Ok(())
        } else {
            Err(ShopdashError::Lock(format!(
                "lease on {} no longer held",
                lease.resource()
            )))
        }
    }
}
