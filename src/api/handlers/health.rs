use axum::{Json, response::IntoResponse};

/// Fixed liveness payload
pub const HEALTHY: &str = "I'm healthy !!";

pub async fn root() -> impl IntoResponse {
    Json(HEALTHY)
}

pub async fn ping() -> impl IntoResponse {
    Json(HEALTHY)
}
