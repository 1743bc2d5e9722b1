use std::sync::Arc;
use tracing::info;

use crate::application::services::chunk_indexer::{ChunkIndexer, IndexingError};
use crate::domain::repositories::{ChildRepository, RecordRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum IndexSourceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Indexing failed: {0}")]
    IndexingFailed(String),
}

impl From<RepositoryError> for IndexSourceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(m) => IndexSourceError::NotFound(m),
            RepositoryError::Forbidden(m) => IndexSourceError::Forbidden(m),
            RepositoryError::DatabaseError(m) => IndexSourceError::IndexingFailed(m),
        }
    }
}

impl From<IndexingError> for IndexSourceError {
    fn from(error: IndexingError) -> Self {
        match error {
            IndexingError::NotFound(m) => IndexSourceError::NotFound(m),
            IndexingError::Repository(e) => e.into(),
            IndexingError::Store(e) => IndexSourceError::IndexingFailed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSourceResponse {
    pub chunks: u64,
}

/// Hooks the external CRUD layer calls after writing children or records.
pub struct IndexSourceUseCase {
    indexer: Arc<ChunkIndexer>,
    child_repository: Arc<dyn ChildRepository>,
    record_repository: Arc<dyn RecordRepository>,
}

impl IndexSourceUseCase {
    pub fn new(
        indexer: Arc<ChunkIndexer>,
        child_repository: Arc<dyn ChildRepository>,
        record_repository: Arc<dyn RecordRepository>,
    ) -> Self {
        Self {
            indexer,
            child_repository,
            record_repository,
        }
    }

    pub async fn index_child(
        &self,
        user_id: i64,
        child_id: i64,
    ) -> Result<IndexSourceResponse, IndexSourceError> {
        // Check ownership before touching the store
        self.child_repository.find_one(child_id, user_id).await?;

        let chunks = self.indexer.index_child(child_id).await?;
        Ok(IndexSourceResponse {
            chunks: chunks as u64,
        })
    }

    pub async fn index_record(
        &self,
        user_id: i64,
        record_id: i64,
    ) -> Result<IndexSourceResponse, IndexSourceError> {
        // Find the record
        let record = self
            .record_repository
            .find_one(record_id)
            .await?
            .ok_or_else(|| IndexSourceError::NotFound(format!("record {}", record_id)))?;

        // Records are owned through their child
        self.child_repository
            .find_one(record.child_id, user_id)
            .await?;

        let chunks = self.indexer.index_loaded_record(&record).await?;
        Ok(IndexSourceResponse {
            chunks: chunks as u64,
        })
    }

    /// Also accepted once the child row is gone, so the CRUD layer can clean
    /// up after a delete.
    pub async fn remove_child(
        &self,
        user_id: i64,
        child_id: i64,
    ) -> Result<IndexSourceResponse, IndexSourceError> {
        match self.child_repository.find_one(child_id, user_id).await {
            Ok(_) | Err(RepositoryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let removed = self.indexer.remove_child(child_id).await?;
        info!(user_id, child_id, removed, "Child chunks removed on request");
        Ok(IndexSourceResponse { chunks: removed })
    }
}
