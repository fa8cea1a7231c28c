#![warn(clippy::unwrap_used)]

pub mod rate_limit;
pub mod rest;
pub mod server;
pub mod swagger;

pub use rest::AppState;
pub use server::ApiServer;
pub use swagger::ApiDoc;
