//! In-process TTL cache backed by DashMap for lock-free concurrent access.
//! Stands in for Redis on single-node deployments and in tests.

use crate::store::{CacheStore, EventPublisher, InvalidationMessage};
use async_trait::async_trait;
use dashmap::DashMap;
use shopdash_core::ShopdashResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

const EVENT_BUFFER: usize = 1024;

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Lock-free local cache with per-key expiry and a broadcast pub/sub bus.
pub struct LocalCache {
    store: Arc<DashMap<String, CacheEntry>>,
    max_entries: usize,
    events: broadcast::Sender<InvalidationMessage>,
}

impl LocalCache {
    pub fn new(max_entries: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            store: Arc::new(DashMap::new()),
            max_entries,
            events,
        }
    }

    /// Receive every message published through this cache from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.events.subscribe()
    }

    /// Remove expired entries. Call this periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired(now));
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheStore for LocalCache {
    async fn get(&self, key: &str) -> ShopdashResult<Option<Vec<u8>>> {
        let Some(entry) = self.store.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(Instant::now()) {
            drop(entry);
            self.store.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.data.clone()))
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> ShopdashResult<()> {
        // Over capacity: skip new keys, the maintenance task frees room.
        if self.store.len() >= self.max_entries && !self.store.contains_key(key) {
            debug!(key = %key, "Local cache full, skipping insert");
            return Ok(());
        }
        self.store.insert(
            key.to_string(),
            CacheEntry {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShopdashResult<()> {
        self.store.remove(key);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for LocalCache {
    async fn publish(&self, channel: &str, message: &str) -> ShopdashResult<()> {
        let event = InvalidationMessage {
            channel: channel.to_string(),
            payload: message.to_string(),
        };
        // No subscribers is not a failure, same as PUBLISH returning 0.
        if self.events.send(event).is_err() {
            debug!(channel = %channel, "Published with no local subscribers");
        }
        Ok(())
    }
}
