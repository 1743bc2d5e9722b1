use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::AuthenticatedUser;
use crate::application::use_cases::{SearchChunksError, SearchChunksRequest, SearchChunksUseCase};
use crate::presentation::http::dto::{
    ApiResponse, SearchRequestDto, SearchResponseDto, error_response,
};

pub struct SearchHandler {
    search_use_case: Arc<SearchChunksUseCase>,
}

impl SearchHandler {
    pub fn new(search_use_case: Arc<SearchChunksUseCase>) -> Self {
        Self { search_use_case }
    }

    pub async fn search_chunks(
        State(handler): State<Arc<SearchHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Path(child_id): Path<i64>,
        Query(search_params): Query<SearchRequestDto>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let source_types = match search_params.parsed_source_types() {
            Ok(types) => types,
            Err(message) => {
                return Ok(error_response::<SearchResponseDto>(
                    StatusCode::BAD_REQUEST,
                    "INVALID_SOURCE_TYPE",
                    message,
                ));
            }
        };

        let request = SearchChunksRequest {
            user_id,
            child_id,
            query: search_params.query,
            limit: search_params.limit,
            threshold: search_params.similarity_threshold,
            source_types,
            created_after: search_params.created_after,
            created_before: search_params.created_before,
        };

        match handler.search_use_case.execute(request).await {
            Ok(response) => {
                let dto = SearchResponseDto::from(response);
                Ok((
                    StatusCode::OK,
                    Json(ApiResponse::<SearchResponseDto>::success(dto)),
                ))
            }
            Err(e) => {
                let (status, code) = match &e {
                    SearchChunksError::ValidationError(_) => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                    }
                    SearchChunksError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    SearchChunksError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                    SearchChunksError::SearchFailed(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "SEARCH_FAILED")
                    }
                };
                Ok(error_response(status, code, e.to_string()))
            }
        }
    }
}
