use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::auth::AuthenticatedUser;
use super::sse_handler::chat_event_stream;
use crate::application::services::{ChatError, ChatOrchestrator, ChatRequest};
use crate::application::use_cases::{
    ChatHistoryError, ListChatHistoryRequest, ListChatHistoryUseCase, SaveFeedbackUseCase,
};
use crate::presentation::http::dto::{
    ApiResponse, ChatHistoryDto, ChatHistoryQueryDto, ChatRequestDto, ChatResponseDto,
    FeedbackRequestDto, error_response,
};

pub struct ChatHandler {
    orchestrator: Arc<ChatOrchestrator>,
    list_history_use_case: Arc<ListChatHistoryUseCase>,
    save_feedback_use_case: Arc<SaveFeedbackUseCase>,
}

impl ChatHandler {
    pub fn new(
        orchestrator: Arc<ChatOrchestrator>,
        list_history_use_case: Arc<ListChatHistoryUseCase>,
        save_feedback_use_case: Arc<SaveFeedbackUseCase>,
    ) -> Self {
        Self {
            orchestrator,
            list_history_use_case,
            save_feedback_use_case,
        }
    }

    pub async fn send_message(
        State(handler): State<Arc<ChatHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Json(body): Json<ChatRequestDto>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let request = ChatRequest {
            user_id,
            child_id: body.child_id,
            message: body.message,
        };

        match handler.orchestrator.send_message(request).await {
            Ok(reply) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(ChatResponseDto::from(reply))),
            )),
            Err(e) => Ok(chat_error(e)),
        }
    }

    /// Always answers with an event stream; failures arrive as the
    /// terminal `error` event.
    pub async fn stream_message(
        State(handler): State<Arc<ChatHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Json(body): Json<ChatRequestDto>,
    ) -> Response {
        let request = ChatRequest {
            user_id,
            child_id: body.child_id,
            message: body.message,
        };

        chat_event_stream(handler.orchestrator.clone().stream_message(request))
    }

    pub async fn list_history(
        State(handler): State<Arc<ChatHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Query(params): Query<ChatHistoryQueryDto>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let request = ListChatHistoryRequest {
            user_id,
            child_id: params.child_id,
            limit: params.limit,
            offset: params.offset,
        };

        match handler.list_history_use_case.execute(request).await {
            Ok(chats) => {
                let dtos: Vec<ChatHistoryDto> = chats.into_iter().map(ChatHistoryDto::from).collect();
                Ok((StatusCode::OK, Json(ApiResponse::success(dtos))))
            }
            Err(e) => Ok(history_error(e)),
        }
    }

    pub async fn save_feedback(
        State(handler): State<Arc<ChatHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Path(chat_id): Path<i64>,
        Json(body): Json<FeedbackRequestDto>,
    ) -> Result<impl IntoResponse, StatusCode> {
        match handler
            .save_feedback_use_case
            .execute(chat_id, user_id, body.feedback)
            .await
        {
            Ok(chat) => Ok((
                StatusCode::OK,
                Json(ApiResponse::success(ChatHistoryDto::from(chat))),
            )),
            Err(e) => Ok(history_error(e)),
        }
    }
}

pub fn chat_error_status(error: &ChatError) -> (StatusCode, &'static str) {
    match error {
        ChatError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        ChatError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ChatError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ChatError::Provider(_) => (StatusCode::BAD_GATEWAY, "MODEL_PROVIDER_FAILED"),
        ChatError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED"),
        ChatError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILED"),
        ChatError::Context(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONTEXT_FAILED"),
    }
}

fn chat_error<T>(error: ChatError) -> (StatusCode, Json<ApiResponse<T>>) {
    let (status, code) = chat_error_status(&error);
    error_response(status, code, error.to_string())
}

fn history_error<T>(error: ChatHistoryError) -> (StatusCode, Json<ApiResponse<T>>) {
    let (status, code) = match &error {
        ChatHistoryError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ChatHistoryError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ChatHistoryError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ChatHistoryError::RepositoryError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "REPOSITORY_ERROR")
        }
    };
    error_response(status, code, error.to_string())
}
