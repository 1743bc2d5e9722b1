use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::AuthenticatedUser;
use crate::application::use_cases::{IndexSourceError, IndexSourceResponse, IndexSourceUseCase};
use crate::presentation::http::dto::{ApiResponse, IndexResponseDto, error_response};

/// Re-indexing hooks for the service that owns children and records.
pub struct IndexHandler {
    index_use_case: Arc<IndexSourceUseCase>,
}

impl IndexHandler {
    pub fn new(index_use_case: Arc<IndexSourceUseCase>) -> Self {
        Self { index_use_case }
    }

    pub async fn index_child(
        State(handler): State<Arc<IndexHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Path(child_id): Path<i64>,
    ) -> Result<impl IntoResponse, StatusCode> {
        Ok(respond(
            handler.index_use_case.index_child(user_id, child_id).await,
        ))
    }

    pub async fn index_record(
        State(handler): State<Arc<IndexHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Path(record_id): Path<i64>,
    ) -> Result<impl IntoResponse, StatusCode> {
        Ok(respond(
            handler.index_use_case.index_record(user_id, record_id).await,
        ))
    }

    pub async fn remove_child(
        State(handler): State<Arc<IndexHandler>>,
        AuthenticatedUser(user_id): AuthenticatedUser,
        Path(child_id): Path<i64>,
    ) -> Result<impl IntoResponse, StatusCode> {
        Ok(respond(
            handler.index_use_case.remove_child(user_id, child_id).await,
        ))
    }
}

fn respond(
    result: Result<IndexSourceResponse, IndexSourceError>,
) -> (StatusCode, Json<ApiResponse<IndexResponseDto>>) {
    match result {
        Ok(response) => (
            StatusCode::OK,
            Json(ApiResponse::success(IndexResponseDto {
                chunks: response.chunks,
            })),
        ),
        Err(e) => {
            let (status, code) = match &e {
                IndexSourceError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                IndexSourceError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                IndexSourceError::IndexingFailed(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INDEXING_FAILED")
                }
            };
            error_response(status, code, e.to_string())
        }
    }
}
