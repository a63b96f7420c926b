//! HTTP server for on-demand folder archives.
//!
//! This crate provides the delivery surface:
//! - Folder archive download with range and If-Range support
//! - Bandwidth throttling of response bodies
//! - Confirmed removal of source folders
//! - Health and Prometheus endpoints
//! - The background cache reaper

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod range;
pub mod reaper;
pub mod routes;
pub mod state;
pub mod throttle;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
