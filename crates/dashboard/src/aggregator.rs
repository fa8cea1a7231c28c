//! Cache-aside dashboard reads with stampede protection, and invalidation.
//!
//! Resolution runs as an explicit state machine:
//!
//! ```text
//! CheckCache ──hit──────────────────────────────────────────────► Done
//!     │ miss
//!     ▼
//! AcquireLock ──acquired──► ComputeUnderLock (re-check, compute, release) ► Done
//!     │ busy / backend error          │ source error
//!     ▼                               ▼
//! PollRetry(1..=n) ──hit────────────────────────────────────────► Done
//!     │ attempts exhausted
//!     ▼
//! DirectCompute ────────────────────────────────────────────────► Done
//! ```
//!
//! Cache, lock and source failures only steer the machine. The caller sees
//! an error only when the final direct computation fails.

use crate::policy::DashboardPolicy;
use shopdash_cache::{CacheStore, EventPublisher, LockLease, LockProvider};
use shopdash_core::{DashboardSnapshot, ShopdashResult, SnapshotSource};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a `fetch` obtained its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Fast path, no lock involved.
    CacheHit,
    /// Another holder filled the cache between the miss and the lock.
    CacheHitAfterLock,
    ComputedUnderLock,
    /// Found while waiting for the lock holder; `attempt` is 1-based.
    PollHit { attempt: u32 },
    /// Polling ran out; computed without the lock.
    DirectCompute,
}

impl Resolution {
    pub fn is_cache_hit(&self) -> bool {
        matches!(
            self,
            Resolution::CacheHit | Resolution::CacheHitAfterLock | Resolution::PollHit { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::CacheHit => "cache_hit",
            Resolution::CacheHitAfterLock => "cache_hit_after_lock",
            Resolution::ComputedUnderLock => "computed_under_lock",
            Resolution::PollHit { .. } => "poll_hit",
            Resolution::DirectCompute => "direct_compute",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardFetch {
    pub snapshot: DashboardSnapshot,
    pub resolution: Resolution,
}

/// Result of a best-effort invalidation. Deletion and notification are
/// reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationOutcome {
    pub deleted: bool,
    pub published: bool,
}

enum Step {
    CheckCache,
    AcquireLock,
    ComputeUnderLock(LockLease),
    PollRetry(u32),
    DirectCompute,
    Done(DashboardFetch),
}

/// Serves the dashboard summary. Holds no mutable state of its own; share
/// one instance per process behind an `Arc`.
pub struct DashboardAggregator {
    cache: Arc<dyn CacheStore>,
    events: Arc<dyn EventPublisher>,
    locks: Arc<dyn LockProvider>,
    source: Arc<dyn SnapshotSource>,
    policy: DashboardPolicy,
}

impl DashboardAggregator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        events: Arc<dyn EventPublisher>,
        locks: Arc<dyn LockProvider>,
        source: Arc<dyn SnapshotSource>,
        policy: DashboardPolicy,
    ) -> Self {
        Self {
            cache,
            events,
            locks,
            source,
            policy,
        }
    }

    pub fn policy(&self) -> &DashboardPolicy {
        &self.policy
    }

    pub async fn get_dashboard(&self) -> ShopdashResult<DashboardSnapshot> {
        Ok(self.fetch().await?.snapshot)
    }

    /// Like `get_dashboard`, also reporting which path produced the snapshot.
    pub async fn fetch(&self) -> ShopdashResult<DashboardFetch> {
        let mut step = Step::CheckCache;
        loop {
            step = match step {
                Step::CheckCache => match self.read_cache().await {
                    Some(snapshot) => {
                        metrics::counter!("dashboard.cache.hit").increment(1);
                        Step::Done(DashboardFetch {
                            snapshot,
                            resolution: Resolution::CacheHit,
                        })
                    }
                    None => {
                        metrics::counter!("dashboard.cache.miss").increment(1);
                        Step::AcquireLock
                    }
                },
                Step::AcquireLock => {
                    match self
                        .locks
                        .try_acquire(&self.policy.lock_resource, self.policy.lock_lease)
                        .await
                    {
                        Ok(Some(lease)) => {
                            metrics::counter!("dashboard.lock.acquired").increment(1);
                            Step::ComputeUnderLock(lease)
                        }
                        Ok(None) => {
                            debug!(resource = %self.policy.lock_resource, "Dashboard lock busy, polling cache");
                            metrics::counter!("dashboard.lock.contended").increment(1);
                            Step::PollRetry(1)
                        }
                        Err(e) => {
                            warn!(resource = %self.policy.lock_resource, error = %e, "Dashboard lock unavailable, polling cache");
                            metrics::counter!("dashboard.lock.contended").increment(1);
                            Step::PollRetry(1)
                        }
                    }
                }
                Step::ComputeUnderLock(lease) => {
                    let outcome = self.resolve_under_lock().await;
                    self.release(&lease).await;
                    match outcome {
                        Ok(fetch) => Step::Done(fetch),
                        Err(e) => {
                            warn!(error = %e, "Dashboard computation under lock failed, polling cache");
                            Step::PollRetry(1)
                        }
                    }
                }
                Step::PollRetry(attempt) if attempt > self.policy.poll_attempts => {
                    Step::DirectCompute
                }
                Step::PollRetry(attempt) => {
                    tokio::time::sleep(self.policy.poll_delay(attempt)).await;
                    match self.read_cache().await {
                        Some(snapshot) => {
                            metrics::counter!("dashboard.poll.hit").increment(1);
                            Step::Done(DashboardFetch {
                                snapshot,
                                resolution: Resolution::PollHit { attempt },
                            })
                        }
                        None => Step::PollRetry(attempt + 1),
                    }
                }
                Step::DirectCompute => {
                    debug!(
                        attempts = self.policy.poll_attempts,
                        "Dashboard poll exhausted, computing directly"
                    );
                    let snapshot = self.compute_and_store("direct").await?;
                    Step::Done(DashboardFetch {
                        snapshot,
                        resolution: Resolution::DirectCompute,
                    })
                }
                Step::Done(fetch) => return Ok(fetch),
            };
        }
    }

    /// Drop the cached snapshot and announce it on the invalidation channel.
    /// Never fails; call after every successful catalog write.
    pub async fn invalidate_dashboard(&self) -> InvalidationOutcome {
        let key = &self.policy.cache_key;
        metrics::counter!("dashboard.invalidations").increment(1);

        let deleted = match self.cache.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete dashboard cache entry");
                false
            }
        };

        let published = match self
            .events
            .publish(&self.policy.invalidation_channel, key)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    key = %key,
                    channel = %self.policy.invalidation_channel,
                    error = %e,
                    "Failed to publish dashboard invalidation"
                );
                false
            }
        };

        debug!(key = %key, deleted = deleted, published = published, "Dashboard cache invalidated");
        InvalidationOutcome { deleted, published }
    }

    async fn resolve_under_lock(&self) -> ShopdashResult<DashboardFetch> {
        if let Some(snapshot) = self.read_cache().await {
            return Ok(DashboardFetch {
                snapshot,
                resolution: Resolution::CacheHitAfterLock,
            });
        }
        let snapshot = self.compute_and_store("locked").await?;
        Ok(DashboardFetch {
            snapshot,
            resolution: Resolution::ComputedUnderLock,
        })
    }

    async fn release(&self, lease: &LockLease) {
        if let Err(e) = self.locks.release(lease).await {
            warn!(resource = %lease.resource(), error = %e, "Failed to release dashboard lock");
        }
    }

    async fn compute_and_store(&self, path: &'static str) -> ShopdashResult<DashboardSnapshot> {
        let snapshot = self.source.compute_snapshot().await?;
        metrics::counter!("dashboard.compute", "path" => path).increment(1);
        self.write_cache(&snapshot).await;
        Ok(snapshot)
    }

    async fn read_cache(&self) -> Option<DashboardSnapshot> {
        let key = &self.policy.cache_key;
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key = %key, "dashboard cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read dashboard cache");
                return None;
            }
        };

        match DashboardSnapshot::from_bytes(&bytes) {
            Ok(snapshot) => {
                debug!(key = %key, "dashboard cache hit");
                Some(snapshot)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable dashboard cache entry");
                if let Err(e) = self.cache.delete(key).await {
                    warn!(key = %key, error = %e, "Failed to delete unreadable dashboard cache entry");
                }
                None
            }
        }
    }

    async fn write_cache(&self, snapshot: &DashboardSnapshot) {
        let key = &self.policy.cache_key;
        let bytes = match snapshot.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize dashboard snapshot");
                return;
            }
        };
        if let Err(e) = self.cache.set_with_expiry(key, &bytes, self.policy.ttl).await {
            warn!(key = %key, error = %e, "Failed to write dashboard cache");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shopdash_cache::{LocalCache, LocalLockProvider};
    use shopdash_core::types::DashboardStats;
    use shopdash_core::ShopdashError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn snapshot_with(total_products: u64) -> DashboardSnapshot {
        DashboardSnapshot {
            stats: DashboardStats {
                total_products,
                total_stock: total_products * 10,
                avg_price: 12.5,
                avg_rating: 4.0,
            },
            top_rated: Vec::new(),
            recent_reviews: Vec::new(),
        }
    }

    /// Each computation returns a distinct snapshot numbered by call count.
    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        /// Number of upcoming computations that fail before it recovers.
        fail_next: AtomicUsize,
    }

    impl CountingSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn compute_snapshot(&self) -> ShopdashResult<DashboardSnapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let transient = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if transient || self.fail.load(Ordering::SeqCst) {
                return Err(ShopdashError::Catalog("database unreachable".into()));
            }
            Ok(snapshot_with(call as u64))
        }
    }

    /// LocalCache with switchable failures and a record of published events.
    #[derive(Default)]
    struct FlakyCache {
        inner: LocalCache,
        fail_get: AtomicBool,
        fail_set: AtomicBool,
        fail_delete: AtomicBool,
        fail_publish: AtomicBool,
        /// Number of upcoming gets forced to miss.
        forced_misses: AtomicUsize,
        published: Mutex<Vec<(String, String)>>,
    }

    fn backend_down() -> ShopdashError {
        ShopdashError::Cache("connection refused".into())
    }

    #[async_trait]
    impl CacheStore for FlakyCache {
        async fn get(&self, key: &str) -> ShopdashResult<Option<Vec<u8>>> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(backend_down());
            }
            if self
                .forced_misses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(None);
            }
            self.inner.get(key).await
        }

        async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> ShopdashResult<()> {
            if self.fail_set.load(Ordering::SeqCst) {
                return Err(backend_down());
            }
            self.inner.set_with_expiry(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> ShopdashResult<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(backend_down());
            }
            self.inner.delete(key).await
        }
    }

    #[async_trait]
    impl EventPublisher for FlakyCache {
        async fn publish(&self, channel: &str, message: &str) -> ShopdashResult<()> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(backend_down());
            }
            self.published
                .lock()
                .push((channel.to_string(), message.to_string()));
            Ok(())
        }
    }

    enum LockMode {
        Real,
        Busy,
        Down,
    }

    struct TestLocks {
        inner: LocalLockProvider,
        mode: LockMode,
        acquires: AtomicUsize,
        releases: AtomicUsize,
        fail_release: AtomicBool,
    }

    impl TestLocks {
        fn new(mode: LockMode) -> Self {
            Self {
                inner: LocalLockProvider::new(),
                mode,
                acquires: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                fail_release: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl LockProvider for TestLocks {
        async fn try_acquire(&self, resource: &str, lease: Duration) -> ShopdashResult<Option<LockLease>> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                LockMode::Real => self.inner.try_acquire(resource, lease).await,
                LockMode::Busy => Ok(None),
                LockMode::Down => Err(ShopdashError::Lock("lock backend unreachable".into())),
            }
        }

        async fn release(&self, lease: &LockLease) -> ShopdashResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            let released = self.inner.release(lease).await;
            if self.fail_release.load(Ordering::SeqCst) {
                return Err(ShopdashError::Lock("release timed out".into()));
            }
            released
        }
    }

    struct Harness {
        cache: Arc<FlakyCache>,
        locks: Arc<TestLocks>,
        source: Arc<CountingSource>,
        aggregator: DashboardAggregator,
    }

    fn harness(mode: LockMode) -> Harness {
        let cache = Arc::new(FlakyCache::default());
        let locks = Arc::new(TestLocks::new(mode));
        let source = Arc::new(CountingSource::default());
        let aggregator = DashboardAggregator::new(
            cache.clone(),
            cache.clone(),
            locks.clone(),
            source.clone(),
            DashboardPolicy::default(),
        );
        Harness {
            cache,
            locks,
            source,
            aggregator,
        }
    }

    async fn seed_cache(h: &Harness, snapshot: &DashboardSnapshot) {
        h.cache
            .inner
            .set_with_expiry(
                &h.aggregator.policy().cache_key,
                &snapshot.to_bytes().unwrap(),
                Duration::from_secs(300),
            )
            .await
            .unwrap();
    }

    async fn cached(h: &Harness) -> Option<DashboardSnapshot> {
        h.cache
            .inner
            .get(&h.aggregator.policy().cache_key)
            .await
            .unwrap()
            .map(|bytes| DashboardSnapshot::from_bytes(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_cache_hit_skips_lock_and_source() {
        let h = harness(LockMode::Real);
        seed_cache(&h, &snapshot_with(42)).await;

        let fetch = h.aggregator.fetch().await.unwrap();

        assert_eq!(fetch.resolution, Resolution::CacheHit);
        assert_eq!(fetch.snapshot, snapshot_with(42));
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.locks.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_computes_under_lock_and_fills_cache() {
        let h = harness(LockMode::Real);

        let fetch = h.aggregator.fetch().await.unwrap();
        assert_eq!(fetch.resolution, Resolution::ComputedUnderLock);
        assert_eq!(fetch.snapshot, snapshot_with(1));
        assert_eq!(cached(&h).await, Some(snapshot_with(1)));
        assert_eq!(h.locks.releases.load(Ordering::SeqCst), 1);
        assert!(!h.locks.inner.is_held(&h.aggregator.policy().lock_resource));

        let again = h.aggregator.fetch().await.unwrap();
        assert_eq!(again.resolution, Resolution::CacheHit);
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_double_check_after_lock() {
        let h = harness(LockMode::Real);
        seed_cache(&h, &snapshot_with(7)).await;
        // First read misses as if the holder finished just after it.
        h.cache.forced_misses.store(1, Ordering::SeqCst);

        let fetch = h.aggregator.fetch().await.unwrap();

        assert_eq!(fetch.resolution, Resolution::CacheHitAfterLock);
        assert_eq!(fetch.snapshot, snapshot_with(7));
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.locks.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_recomputes() {
        let h = harness(LockMode::Real);
        h.aggregator.get_dashboard().await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        let fetch = h.aggregator.fetch().await.unwrap();
        assert_eq!(fetch.resolution, Resolution::CacheHit);

        tokio::time::advance(Duration::from_secs(2)).await;
        let fetch = h.aggregator.fetch().await.unwrap();
        assert_eq!(fetch.resolution, Resolution::ComputedUnderLock);
        assert_eq!(fetch.snapshot, snapshot_with(2));
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_lock_polls_until_holder_writes() {
        let h = harness(LockMode::Busy);
        let holder_cache = h.cache.clone();
        let key = h.aggregator.policy().cache_key.clone();
        let bytes = snapshot_with(99).to_bytes().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            holder_cache
                .inner
                .set_with_expiry(&key, &bytes, Duration::from_secs(300))
                .await
                .unwrap();
        });

        let started = Instant::now();
        let fetch = h.aggregator.fetch().await.unwrap();

        // Polls at 200ms and 200+400ms; the second one sees the entry.
        assert_eq!(fetch.resolution, Resolution::PollHit { attempt: 2 });
        assert_eq!(fetch.snapshot, snapshot_with(99));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(600) && waited < Duration::from_millis(650));
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_outage_falls_back_after_bounded_polls() {
        let h = harness(LockMode::Down);

        let started = Instant::now();
        let fetch = h.aggregator.fetch().await.unwrap();

        assert_eq!(fetch.resolution, Resolution::DirectCompute);
        let waited = started.elapsed();
        let ladder = h.aggregator.policy().max_poll_wait();
        assert!(waited >= ladder && waited < ladder + Duration::from_millis(100));
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.locks.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(h.locks.releases.load(Ordering::SeqCst), 0);
        assert_eq!(cached(&h).await, Some(snapshot_with(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanently_busy_lock_still_answers() {
        let h = harness(LockMode::Busy);
        let fetch = h.aggregator.fetch().await.unwrap();
        assert_eq!(fetch.resolution, Resolution::DirectCompute);
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_read_failure_degrades_to_compute() {
        let h = harness(LockMode::Real);
        h.cache.fail_get.store(true, Ordering::SeqCst);

        let first = h.aggregator.fetch().await.unwrap();
        let second = h.aggregator.fetch().await.unwrap();

        assert_eq!(first.resolution, Resolution::ComputedUnderLock);
        assert_eq!(second.resolution, Resolution::ComputedUnderLock);
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_snapshot() {
        let h = harness(LockMode::Real);
        h.cache.fail_set.store(true, Ordering::SeqCst);

        let snapshot = h.aggregator.get_dashboard().await.unwrap();
        assert_eq!(snapshot, snapshot_with(1));
        assert!(cached(&h).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_locked_compute_falls_back_to_direct() {
        let h = harness(LockMode::Real);
        h.source.fail_next.store(1, Ordering::SeqCst);

        let started = Instant::now();
        let fetch = h.aggregator.fetch().await.unwrap();

        assert_eq!(fetch.resolution, Resolution::DirectCompute);
        assert_eq!(fetch.snapshot, snapshot_with(2));
        assert!(started.elapsed() >= h.aggregator.policy().max_poll_wait());
        assert_eq!(h.source.calls(), 2);
        assert_eq!(h.locks.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(h.locks.releases.load(Ordering::SeqCst), 1);
        assert!(!h.locks.inner.is_held(&h.aggregator.policy().lock_resource));
        assert_eq!(cached(&h).await, Some(snapshot_with(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_source_failure_surfaces_after_direct_compute() {
        let h = harness(LockMode::Real);
        h.source.fail.store(true, Ordering::SeqCst);

        let started = Instant::now();
        let result = h.aggregator.get_dashboard().await;

        assert!(matches!(result, Err(ShopdashError::Catalog(_))));
        assert!(started.elapsed() >= h.aggregator.policy().max_poll_wait());
        // Once under the lock, once directly.
        assert_eq!(h.source.calls(), 2);
        assert_eq!(h.locks.releases.load(Ordering::SeqCst), 1);
        assert!(!h.locks.inner.is_held(&h.aggregator.policy().lock_resource));
        assert!(cached(&h).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_after_failed_compute_picks_up_other_writer() {
        let h = harness(LockMode::Real);
        h.source.fail_next.store(1, Ordering::SeqCst);
        let writer_cache = h.cache.clone();
        let key = h.aggregator.policy().cache_key.clone();
        let bytes = snapshot_with(77).to_bytes().unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            writer_cache
                .inner
                .set_with_expiry(&key, &bytes, Duration::from_secs(300))
                .await
                .unwrap();
        });

        let fetch = h.aggregator.fetch().await.unwrap();

        assert_eq!(fetch.resolution, Resolution::PollHit { attempt: 1 });
        assert_eq!(fetch.snapshot, snapshot_with(77));
        assert_eq!(h.source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_on_direct_path_propagates() {
        let h = harness(LockMode::Down);
        h.source.fail.store(true, Ordering::SeqCst);
        assert!(h.aggregator.get_dashboard().await.is_err());
    }

    #[tokio::test]
    async fn test_release_failure_is_not_surfaced() {
        let h = harness(LockMode::Real);
        h.locks.fail_release.store(true, Ordering::SeqCst);

        let fetch = h.aggregator.fetch().await.unwrap();
        assert_eq!(fetch.resolution, Resolution::ComputedUnderLock);
        assert_eq!(h.locks.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_replaced() {
        let h = harness(LockMode::Real);
        h.cache
            .inner
            .set_with_expiry(
                &h.aggregator.policy().cache_key,
                b"{not a snapshot",
                Duration::from_secs(300),
            )
            .await
            .unwrap();

        let fetch = h.aggregator.fetch().await.unwrap();
        assert_eq!(fetch.resolution, Resolution::ComputedUnderLock);
        assert_eq!(cached(&h).await, Some(snapshot_with(1)));
    }

    #[tokio::test]
    async fn test_invalidate_clears_entry_and_notifies_once() {
        let h = harness(LockMode::Real);
        let before = h.aggregator.get_dashboard().await.unwrap();

        let outcome = h.aggregator.invalidate_dashboard().await;
        assert_eq!(
            outcome,
            InvalidationOutcome {
                deleted: true,
                published: true
            }
        );
        assert!(cached(&h).await.is_none());
        assert_eq!(
            *h.cache.published.lock(),
            vec![(
                "cache:invalidate".to_string(),
                "dashboard:summary:v1".to_string()
            )]
        );

        let after = h.aggregator.fetch().await.unwrap();
        assert_eq!(after.resolution, Resolution::ComputedUnderLock);
        assert_ne!(after.snapshot, before);
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_reports_delete_and_publish_separately() {
        let h = harness(LockMode::Real);
        seed_cache(&h, &snapshot_with(3)).await;

        h.cache.fail_delete.store(true, Ordering::SeqCst);
        let outcome = h.aggregator.invalidate_dashboard().await;
        assert!(!outcome.deleted);
        assert!(outcome.published);

        h.cache.fail_delete.store(false, Ordering::SeqCst);
        h.cache.fail_publish.store(true, Ordering::SeqCst);
        let outcome = h.aggregator.invalidate_dashboard().await;
        assert!(outcome.deleted);
        assert!(!outcome.published);
        assert!(cached(&h).await.is_none());
        assert_eq!(h.cache.published.lock().len(), 1);
    }

    #[test]
    fn test_resolution_classification() {
        assert!(Resolution::CacheHit.is_cache_hit());
        assert!(Resolution::PollHit { attempt: 3 }.is_cache_hit());
        assert!(!Resolution::ComputedUnderLock.is_cache_hit());
        assert!(!Resolution::DirectCompute.is_cache_hit());
        assert_eq!(Resolution::CacheHitAfterLock.as_str(), "cache_hit_after_lock");
    }
}
