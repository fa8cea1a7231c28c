//! Cache store and event publisher capabilities consumed by the dashboard.
//!
//! Both are fallible at the adapter level. Callers on the read path treat
//! every error as a degraded condition (miss / no-op), never as a request
//! failure.

use async_trait::async_trait;
use shopdash_core::ShopdashResult;
use std::time::Duration;

/// Key-value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `None` for absent or expired keys.
    async fn get(&self, key: &str) -> ShopdashResult<Option<Vec<u8>>>;

    /// Replaces any existing value. The entry is treated as absent once `ttl`
    /// has elapsed.
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> ShopdashResult<()>;

    async fn delete(&self, key: &str) -> ShopdashResult<()>;
}

/// Fire-and-forget notification channel.
///
/// Kept apart from `CacheStore` so a failed publish is never mistaken for a
/// failed delete.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, message: &str) -> ShopdashResult<()>;
}

/// A notification delivered on a pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationMessage {
    pub channel: String,
    pub payload: String,
}
