//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload and blur job submission
//! - Job status polling, result download and deletion
//! - Optional shared-secret authentication, rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
