//! Dashboard summary served cache-aside with stampede protection.
//!
//! The aggregator reads the summary from a shared cache, recomputes it under
//! a distributed lock on a miss, polls while someone else holds the lock,
//! and falls back to computing directly when polling runs out. All
//! coordination state lives in the cache and lock backends.

#![warn(clippy::unwrap_used)]

pub mod aggregator;
pub mod policy;

pub use aggregator::{DashboardAggregator, DashboardFetch, InvalidationOutcome, Resolution};
pub use policy::DashboardPolicy;
