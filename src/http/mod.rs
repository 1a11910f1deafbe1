//! HTTP surface through which endpoint handlers ask for admission.

mod handlers;
mod server;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use handlers::{AdmitRequest, AdmitResponse, CountResponse, HealthResponse};
pub use server::HttpServer;

use crate::ratelimit::RateLimiter;

/// Build the service router around a shared limiter.
pub fn router(limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/admit", post(handlers::admit))
        .route("/v1/count/:identifier", get(handlers::count))
        .layer(TraceLayer::new_for_http())
        .with_state(limiter)
}
