use axum::{Router, routing::post};
use std::sync::Arc;

use crate::presentation::http::handlers::IndexHandler;

pub fn index_routes(index_handler: Arc<IndexHandler>) -> Router {
    Router::new()
        .route(
            "/index/children/{child_id}",
            post(IndexHandler::index_child).delete(IndexHandler::remove_child),
        )
        .route("/index/records/{record_id}", post(IndexHandler::index_record))
        .with_state(index_handler)
}
