pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use axum::{Router, routing::get};

/// Liveness routes. The worker itself has no HTTP surface beyond these.
pub fn create_app() -> Router {
    Router::new()
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::root))
        .route("/health/", get(api::handlers::health::root))
        .route(
            "/ping",
            get(api::handlers::health::ping).post(api::handlers::health::ping),
        )
        .route(
            "/health/ping",
            get(api::handlers::health::ping).post(api::handlers::health::ping),
        )
}
