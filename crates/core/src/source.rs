//! Aggregate query interface consumed by the dashboard aggregator.

use crate::error::ShopdashResult;
use crate::types::DashboardSnapshot;
use async_trait::async_trait;

/// Computes a fresh dashboard snapshot from the source of truth.
///
/// Implementations should read all aggregates from one logical view of the
/// data. Errors are genuine data-source failures and are propagated to the
/// dashboard caller.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn compute_snapshot(&self) -> ShopdashResult<DashboardSnapshot>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EmptySource;

    #[async_trait]
    impl SnapshotSource for EmptySource {
        async fn compute_snapshot(&self) -> ShopdashResult<DashboardSnapshot> {
            Ok(DashboardSnapshot::empty())
        }
    }

    #[tokio::test]
    async fn test_source_usable_as_trait_object() {
        let source: Arc<dyn SnapshotSource> = Arc::new(EmptySource);
        let snapshot = source.compute_snapshot().await.unwrap();
        assert_eq!(snapshot.stats.total_products, 0);
    }
}
