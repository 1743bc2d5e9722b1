use axum::{Router, routing::get};
use std::sync::Arc;

use crate::presentation::http::handlers::SearchHandler;

pub fn search_routes(search_handler: Arc<SearchHandler>) -> Router {
    Router::new()
        .route(
            "/children/{child_id}/search",
            get(SearchHandler::search_chunks),
        )
        .with_state(search_handler)
}
