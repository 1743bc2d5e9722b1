use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::entities::ScoredChunk;
use crate::domain::repositories::{ChildRepository, RepositoryError, VectorStore};
use crate::domain::value_objects::{SearchFilters, SourceType};

#[derive(Debug, thiserror::Error)]
pub enum SearchChunksError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Search failed: {0}")]
    SearchFailed(String),
}

impl From<RepositoryError> for SearchChunksError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(m) => SearchChunksError::NotFound(m),
            RepositoryError::Forbidden(m) => SearchChunksError::Forbidden(m),
            RepositoryError::DatabaseError(m) => SearchChunksError::SearchFailed(m),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchChunksRequest {
    pub user_id: i64,
    pub child_id: i64,
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    pub source_types: Option<Vec<SourceType>>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SearchChunksResponse {
    pub query: String,
    pub results: Vec<ScoredChunk>,
    pub total_results: usize,
    pub search_time_ms: u64,
}

pub struct SearchChunksUseCase {
    vector_store: Arc<dyn VectorStore>,
    child_repository: Arc<dyn ChildRepository>,
    default_limit: usize,
    default_threshold: f32,
}

impl SearchChunksUseCase {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        child_repository: Arc<dyn ChildRepository>,
        default_limit: usize,
        default_threshold: f32,
    ) -> Self {
        Self {
            vector_store,
            child_repository,
            default_limit,
            default_threshold,
        }
    }

    pub async fn execute(
        &self,
        request: SearchChunksRequest,
    ) -> Result<SearchChunksResponse, SearchChunksError> {
        let start_time = std::time::Instant::now();

        // Validate input
        if request.query.trim().is_empty() {
            return Err(SearchChunksError::ValidationError(
                "Query cannot be empty".to_string(),
            ));
        }

        let limit = request.limit.unwrap_or(self.default_limit);
        if limit == 0 || limit > 100 {
            return Err(SearchChunksError::ValidationError(
                "Limit must be between 1 and 100".to_string(),
            ));
        }

        let threshold = request.threshold.unwrap_or(self.default_threshold);
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(SearchChunksError::ValidationError(
                "Threshold must be between -1 and 1".to_string(),
            ));
        }

        if matches!(
            (request.created_after, request.created_before),
            (Some(after), Some(before)) if after > before
        ) {
            return Err(SearchChunksError::ValidationError(
                "createdAfter must not be later than createdBefore".to_string(),
            ));
        }

        // Verify the child belongs to the caller
        self.child_repository
            .find_one(request.child_id, request.user_id)
            .await?;

        // Build filters only when something narrows the search
        let source_types = request.source_types.filter(|types| !types.is_empty());
        let has_date_range = request.created_after.is_some() || request.created_before.is_some();

        let filters = (source_types.is_some() || has_date_range).then(|| {
            let mut filters = SearchFilters::default()
                .with_date_range(request.created_after, request.created_before);
            if let Some(types) = source_types {
                filters = filters.with_source_types(types);
            }
            filters
        });

        // Perform vector search
        let results = self
            .vector_store
            .search(
                &request.query,
                request.child_id,
                limit,
                threshold,
                filters.as_ref(),
            )
            .await
            .map_err(|e| SearchChunksError::SearchFailed(e.to_string()))?;

        Ok(SearchChunksResponse {
            query: request.query,
            total_results: results.len(),
            results,
            search_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}
