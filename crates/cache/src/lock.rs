//! Single-holder, time-bounded locks on named resources.
//!
//! A lease expires on its own after its duration even if `release` is never
//! called, so a holder that dies mid-computation cannot wedge the resource.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shopdash_core::{ShopdashError, ShopdashResult};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Proof of holding a lock. The token identifies this holder so a release
/// after the lease was lost cannot free someone else's lock.
#[derive(Debug, Clone)]
pub struct LockLease {
    resource: String,
    token: String,
    lease: Duration,
    acquired_at: Instant,
}

impl LockLease {
    pub fn new(resource: impl Into<String>, lease: Duration) -> Self {
        Self {
            resource: resource.into(),
            token: Uuid::new_v4().to_string(),
            lease,
            acquired_at: Instant::now(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub fn expires_at(&self) -> Instant {
        self.acquired_at + self.lease
    }
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// One non-blocking attempt. `Ok(None)` means another holder has it.
    async fn try_acquire(&self, resource: &str, lease: Duration) -> ShopdashResult<Option<LockLease>>;

    /// Errors when the lease is no longer held by this token.
    async fn release(&self, lease: &LockLease) -> ShopdashResult<()>;
}

struct HeldLock {
    token: String,
    expires_at: Instant,
}

/// In-process lock table. Only coordinates callers sharing this instance.
#[derive(Default)]
pub struct LocalLockProvider {
    held: DashMap<String, HeldLock>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, resource: &str) -> bool {
        self.held
            .get(resource)
            .is_some_and(|held| held.expires_at > Instant::now())
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn try_acquire(&self, resource: &str, lease: Duration) -> ShopdashResult<Option<LockLease>> {
        let now = Instant::now();
        let granted = LockLease::new(resource, lease);
        let held = HeldLock {
            token: granted.token.clone(),
            expires_at: granted.expires_at(),
        };

        match self.held.entry(resource.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(None);
                }
                // Previous lease ran out.
                occupied.insert(held);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(held);
            }
        }
        Ok(Some(granted))
    }

    async fn release(&self, lease: &LockLease) -> ShopdashResult<()> {
        let removed = self
            .held
            .remove_if(lease.resource(), |_, held| held.token == lease.token());

        match removed {
            Some((_, held)) if held.expires_at > Instant::now() => Ok(()),
            _ => Err(ShopdashError::Lock(format!(
                "lease on {} no longer held",
                lease.resource()
            ))),
        }
    }
}
