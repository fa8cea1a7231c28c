#![warn(clippy::unwrap_used)]

pub mod local;
pub mod lock;
pub mod pubsub;
pub mod redis_backend;
pub mod store;

pub use local::LocalCache;
pub use lock::{LocalLockProvider, LockLease, LockProvider};
pub use pubsub::{InvalidationHandler, InvalidationListener};
pub use redis_backend::{RedisBackend, RedisCacheStore, RedisLockProvider};
pub use store::{CacheStore, EventPublisher, InvalidationMessage};
