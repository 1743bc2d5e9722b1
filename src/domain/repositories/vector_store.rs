use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{NewTextChunk, ScoredChunk, TextChunk};
use crate::domain::value_objects::{SearchFilters, SourceType};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Embedding error: {0}")]
    EmbeddingError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Rejects empty batches and blank chunk content before anything is embedded.
pub fn validate_new_chunks(chunks: &[NewTextChunk]) -> Result<(), VectorStoreError> {
    if chunks.is_empty() {
        return Err(VectorStoreError::ValidationError(
            "Chunk batch cannot be empty".to_string(),
        ));
    }
    if let Some(position) = chunks.iter().position(NewTextChunk::is_empty) {
        return Err(VectorStoreError::ValidationError(format!(
            "Chunk {} has no content",
            position
        )));
    }
    Ok(())
}

/// Replacement chunks must all belong to the source being replaced. An empty
/// list is allowed and clears the source.
pub fn validate_replacement(
    source_type: SourceType,
    source_id: i64,
    chunks: &[NewTextChunk],
) -> Result<(), VectorStoreError> {
    if chunks.is_empty() {
        return Ok(());
    }
    validate_new_chunks(chunks)?;

    if chunks
        .iter()
        .any(|c| c.source_type != source_type || c.source_id != source_id)
    {
        return Err(VectorStoreError::ValidationError(format!(
            "Replacement chunks must all belong to {} {}",
            source_type, source_id
        )));
    }
    Ok(())
}

pub fn validate_content(content: &str) -> Result<(), VectorStoreError> {
    if content.trim().is_empty() {
        return Err(VectorStoreError::ValidationError(
            "Chunk content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Similarity store over chunks of every source type.
///
/// Implementations embed content themselves: `add*` and `update` call the
/// configured embedder, `search` embeds the query text. Mutations report
/// whether rows were touched instead of failing on zero matches.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, chunk: NewTextChunk) -> Result<TextChunk, VectorStoreError>;

    /// Inserts all chunks in one transaction; nothing is stored on failure.
    async fn add_batch(&self, chunks: Vec<NewTextChunk>)
    -> Result<Vec<TextChunk>, VectorStoreError>;

    /// Swaps every chunk of one source for `chunks`. New embeddings are
    /// computed before anything is deleted, and the delete and insert commit
    /// together, so a failure leaves the previous chunks in place. Returns
    /// the number of removed rows and the stored chunks.
    async fn replace_source(
        &self,
        source_type: SourceType,
        source_id: i64,
        chunks: Vec<NewTextChunk>,
    ) -> Result<(u64, Vec<TextChunk>), VectorStoreError>;

    /// Chunks of `child_id` with similarity `>= threshold`, best first.
    async fn search(
        &self,
        query_text: &str,
        child_id: i64,
        limit: usize,
        threshold: f32,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<TextChunk>, VectorStoreError>;

    async fn get_by_source(
        &self,
        source_type: SourceType,
        source_id: i64,
    ) -> Result<Vec<TextChunk>, VectorStoreError>;

    async fn get_by_child_id(
        &self,
        child_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TextChunk>, VectorStoreError>;

    /// Replaces content (and optionally metadata) and recomputes the embedding.
    async fn update(
        &self,
        id: i64,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool, VectorStoreError>;

    async fn delete(&self, id: i64) -> Result<bool, VectorStoreError>;

    async fn delete_by_source(
        &self,
        source_type: SourceType,
        source_id: i64,
    ) -> Result<u64, VectorStoreError>;

    async fn delete_by_child_id(&self, child_id: i64) -> Result<u64, VectorStoreError>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, VectorStoreError>;

    async fn count(&self, child_id: Option<i64>) -> Result<u64, VectorStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunks_must_have_content() {
        assert!(matches!(
            validate_new_chunks(&[]),
            Err(VectorStoreError::ValidationError(_))
        ));
        assert!(matches!(
            validate_new_chunks(&[
                NewTextChunk::new("napped at noon", SourceType::Record, 1, 1),
                NewTextChunk::new(" \n", SourceType::Record, 1, 1),
            ]),
            Err(VectorStoreError::ValidationError(message)) if message.contains("Chunk 1")
        ));
        assert!(validate_content("").is_err());
        assert!(validate_content("teething").is_ok());
    }

    #[test]
    fn test_replacement_must_match_source() {
        assert!(validate_replacement(SourceType::Record, 5, &[]).is_ok());
        assert!(validate_replacement(
            SourceType::Record,
            5,
            &[NewTextChunk::new("bottle", SourceType::Record, 5, 1)]
        )
        .is_ok());
        assert!(matches!(
            validate_replacement(
                SourceType::Record,
                5,
                &[NewTextChunk::new("bottle", SourceType::ChatHistory, 5, 1)]
            ),
            Err(VectorStoreError::ValidationError(_))
        ));
    }
}
