use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::presentation::http::handlers::ChatHandler;

pub fn chat_routes(chat_handler: Arc<ChatHandler>) -> Router {
    Router::new()
        .route("/chat", post(ChatHandler::send_message))
        .route("/chat/stream", post(ChatHandler::stream_message))
        .route("/chat/history", get(ChatHandler::list_history))
        .route("/chat/{chat_id}/feedback", post(ChatHandler::save_feedback))
        .with_state(chat_handler)
}
