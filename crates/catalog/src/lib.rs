#![warn(clippy::unwrap_used)]

pub mod seed;
pub mod store;

pub use store::CatalogStore;
