#![warn(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::AppConfig;
pub use error::{ShopdashError, ShopdashResult};
pub use source::SnapshotSource;
pub use types::DashboardSnapshot;
