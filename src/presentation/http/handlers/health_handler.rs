use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::warn;

use crate::domain::repositories::VectorStore;
use crate::infrastructure::database::DbPool;
use crate::presentation::http::dto::{ApiResponse, HealthResponseDto, PoolStateDto};

/// Liveness plus a cheap look at the chunk store and the connection pool.
pub struct HealthHandler {
    vector_store: Arc<dyn VectorStore>,
    vector_backend: &'static str,
    db_pool: Option<DbPool>,
}

impl HealthHandler {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        vector_backend: &'static str,
        db_pool: Option<DbPool>,
    ) -> Self {
        Self {
            vector_store,
            vector_backend,
            db_pool,
        }
    }

    pub async fn health(State(handler): State<Arc<HealthHandler>>) -> impl IntoResponse {
        let indexed_chunks = match handler.vector_store.count(None).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Health check could not count chunks");
                None
            }
        };

        let database = handler.db_pool.as_ref().map(|pool| {
            let state = pool.state();
            PoolStateDto {
                connections: state.connections,
                idle_connections: state.idle_connections,
            }
        });

        let (status_code, status) = match indexed_chunks {
            Some(_) => (StatusCode::OK, "healthy"),
            None => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        };

        let health_response = HealthResponseDto {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vector_store: handler.vector_backend.to_string(),
            indexed_chunks,
            database,
        };

        (status_code, Json(ApiResponse::success(health_response)))
    }
}
