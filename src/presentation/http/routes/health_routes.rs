use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use std::sync::Arc;

use crate::presentation::http::dto::ApiResponse;
use crate::presentation::http::handlers::HealthHandler;

pub fn health_routes(health_handler: Arc<HealthHandler>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(HealthHandler::health))
        .with_state(health_handler)
}

async fn root_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success("nestling-context".to_string())),
    )
}
