//! In-memory [`VectorStore`] used for tests and database-less deployments.
//!
//! Rows live in insertion order behind a `tokio::sync::RwLock`; search is a
//! brute-force cosine scan over the rows of one child. Equal scores keep
//! insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;
use tracing::warn;

use crate::application::ports::Embedder;
use crate::application::services::vector_math::{find_most_similar, normalize_vector};
use crate::domain::entities::{NewTextChunk, ScoredChunk, TextChunk};
use crate::domain::repositories::vector_store::{
    validate_content, validate_new_chunks, validate_replacement,
};
use crate::domain::repositories::{VectorStore, VectorStoreError};
use crate::domain::value_objects::{SearchFilters, SourceType};

pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    rows: RwLock<Vec<TextChunk>>,
    next_id: AtomicI64,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn materialize(&self, chunk: NewTextChunk, embedding: Vec<f32>) -> TextChunk {
        let now = Utc::now();
        TextChunk {
            id: self.next_id.fetch_add(1, AtomicOrdering::SeqCst),
            content: chunk.content,
            source_type: chunk.source_type,
            source_id: chunk.source_id,
            child_id: chunk.child_id,
            metadata: chunk.metadata,
            embedding,
            created_at: now,
            updated_at: now,
        }
    }

    /// Embeds and materializes without touching the stored rows.
    async fn prepare_batch(
        &self,
        chunks: Vec<NewTextChunk>,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(embedding_error)?;

        if embeddings.len() != chunks.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| self.materialize(chunk, embedding))
            .collect())
    }

    #[cfg(test)]
    pub(crate) async fn backdate(&self, id: i64, created_at: DateTime<Utc>) {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.created_at = created_at;
        }
    }
}

fn embedding_error(e: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::EmbeddingError(e.to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, chunk: NewTextChunk) -> Result<TextChunk, VectorStoreError> {
        validate_content(&chunk.content)?;
        let embedding = self
            .embedder
            .embed(&chunk.content)
            .await
            .map_err(embedding_error)?;

        let stored = self.materialize(chunk, embedding);
        self.rows.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn add_batch(
        &self,
        chunks: Vec<NewTextChunk>,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        validate_new_chunks(&chunks)?;

        let stored = self.prepare_batch(chunks).await?;
        self.rows.write().await.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn replace_source(
        &self,
        source_type: SourceType,
        source_id: i64,
        chunks: Vec<NewTextChunk>,
    ) -> Result<(u64, Vec<TextChunk>), VectorStoreError> {
        validate_replacement(source_type, source_id, &chunks)?;

        let stored = if chunks.is_empty() {
            Vec::new()
        } else {
            self.prepare_batch(chunks).await?
        };

        // One write guard covers the delete and the insert.
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !row.is_from_source(source_type, source_id));
        let removed = (before - rows.len()) as u64;
        rows.extend(stored.iter().cloned());

        Ok((removed, stored))
    }

    async fn search(
        &self,
        query_text: &str,
        child_id: i64,
        limit: usize,
        threshold: f32,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let query = self
            .embedder
            .embed(query_text)
            .await
            .map_err(embedding_error)?;

        let query = normalize_vector(&query);

        let rows = self.rows.read().await;
        let candidates: Vec<&TextChunk> = rows
            .iter()
            .filter(|row| row.belongs_to_child(child_id))
            .filter(|row| {
                filters
                    .map(|f| f.accepts(row.source_type, row.created_at, &row.metadata))
                    .unwrap_or(true)
            })
            .filter(|row| {
                let matches = row.dimension() == query.len();
                if !matches {
                    warn!(
                        chunk_id = row.id,
                        expected = query.len(),
                        actual = row.dimension(),
                        "Skipping chunk with mismatched embedding"
                    );
                }
                matches
            })
            .collect();

        let vectors: Vec<Vec<f32>> = candidates.iter().map(|row| row.embedding.clone()).collect();
        let hits: Vec<ScoredChunk> = find_most_similar(&query, &vectors, Some(&candidates[..]), limit, threshold)
            .map_err(embedding_error)?
            .into_iter()
            .filter_map(|m| {
                m.metadata.map(|row| ScoredChunk {
                    chunk: row.clone(),
                    similarity: m.similarity,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TextChunk>, VectorStoreError> {
        Ok(self.rows.read().await.iter().find(|row| row.id == id).cloned())
    }

    async fn get_by_source(
        &self,
        source_type: SourceType,
        source_id: i64,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|row| row.is_from_source(source_type, source_id))
            .cloned()
            .collect())
    }

    async fn get_by_child_id(
        &self,
        child_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        let rows = self.rows.read().await;
        let mut owned: Vec<&TextChunk> =
            rows.iter().filter(|row| row.belongs_to_child(child_id)).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: i64,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool, VectorStoreError> {
        validate_content(content)?;
        if self.get_by_id(id).await?.is_none() {
            return Ok(false);
        }

        let embedding = self.embedder.embed(content).await.map_err(embedding_error)?;

        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                row.content = content.to_string();
                row.embedding = embedding;
                if let Some(metadata) = metadata {
                    row.metadata = metadata;
                }
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, VectorStoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }

    async fn delete_by_source(
        &self,
        source_type: SourceType,
        source_id: i64,
    ) -> Result<u64, VectorStoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !row.is_from_source(source_type, source_id));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_by_child_id(&self, child_id: i64) -> Result<u64, VectorStoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !row.belongs_to_child(child_id));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, VectorStoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| row.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, child_id: Option<i64>) -> Result<u64, VectorStoreError> {
        let rows = self.rows.read().await;
        Ok(match child_id {
            Some(child_id) => rows.iter().filter(|row| row.belongs_to_child(child_id)).count(),
            None => rows.len(),
        } as u64)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::KeywordEmbedder;
    use super::*;
    use crate::domain::value_objects::MetadataMatch;
    use chrono::Duration;
    use serde_json::json;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(KeywordEmbedder::new(vec![
            "sleep", "feeding", "rash", "teeth",
        ])))
    }

    fn chunk(content: &str, source_type: SourceType, source_id: i64, child_id: i64) -> NewTextChunk {
        NewTextChunk::new(content, source_type, source_id, child_id)
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_child_and_threshold() {
        let store = store();
        store
            .add_batch(vec![
                chunk("sleep through the night", SourceType::Record, 1, 1),
                chunk("sleep regression at night", SourceType::Record, 2, 2),
                chunk("feeding schedule", SourceType::Record, 3, 1),
            ])
            .await
            .unwrap();

        let hits = store.search("sleep", 1, 10, 0.6, None).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.chunk.child_id == 1));
        assert!(hits.iter().all(|h| h.similarity >= 0.6));
        assert_eq!(hits[0].chunk.source_id, 1);
    }

    #[tokio::test]
    async fn test_search_orders_and_limits() {
        let store = store();
        store
            .add_batch(vec![
                chunk("feeding", SourceType::Record, 1, 1),
                chunk("sleep and feeding", SourceType::Record, 2, 1),
                chunk("sleep", SourceType::Record, 3, 1),
                chunk("sleep again", SourceType::ChatHistory, 4, 1),
            ])
            .await
            .unwrap();

        let hits = store.search("sleep", 1, 2, 0.0, None).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits[0].similarity >= hits[1].similarity);
        // equal scores keep insertion order
        assert_eq!(hits[0].chunk.source_id, 3);
        assert_eq!(hits[1].chunk.source_id, 4);
    }

    #[tokio::test]
    async fn test_search_applies_filters() {
        let store = store();
        store
            .add_batch(vec![
                chunk("sleep log", SourceType::Record, 1, 1)
                    .with_metadata(json!({"recordType": "sleep"})),
                chunk("sleep talk", SourceType::ChatHistory, 2, 1),
            ])
            .await
            .unwrap();

        let by_type = SearchFilters::default().with_source_types(vec![SourceType::ChatHistory]);
        let hits = store.search("sleep", 1, 10, 0.0, Some(&by_type)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source_type, SourceType::ChatHistory);

        let by_metadata = SearchFilters::default()
            .with_metadata("recordType", MetadataMatch::Text("sleep".to_string()));
        let hits = store
            .search("sleep", 1, 10, 0.0, Some(&by_metadata))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source_id, 1);
    }

    #[tokio::test]
    async fn test_add_batch_is_all_or_nothing() {
        let store = store();
        let result = store
            .add_batch(vec![
                chunk("sleep", SourceType::Record, 1, 1),
                chunk("  ", SourceType::Record, 2, 1),
            ])
            .await;

        assert!(matches!(result, Err(VectorStoreError::ValidationError(_))));
        assert!(matches!(
            store.add_batch(vec![]).await,
            Err(VectorStoreError::ValidationError(_))
        ));
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_update_is_rejected() {
        let store = store();
        let stored = store
            .add(chunk("feeding", SourceType::Record, 1, 1))
            .await
            .unwrap();

        assert!(matches!(
            store.update(stored.id, "   ", None).await,
            Err(VectorStoreError::ValidationError(_))
        ));
        let unchanged = store.get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(unchanged.content, "feeding");
    }

    #[tokio::test]
    async fn test_replace_source_swaps_only_that_source() {
        let store = store();
        store
            .add_batch(vec![
                chunk("sleep old", SourceType::Record, 1, 1),
                chunk("rash old", SourceType::Record, 1, 1),
                chunk("teeth", SourceType::Record, 2, 1),
            ])
            .await
            .unwrap();

        let (removed, stored) = store
            .replace_source(
                SourceType::Record,
                1,
                vec![chunk("sleep new", SourceType::Record, 1, 1)],
            )
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(stored.len(), 1);
        let current = store.get_by_source(SourceType::Record, 1).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].content, "sleep new");
        assert_eq!(store.get_by_source(SourceType::Record, 2).await.unwrap().len(), 1);

        let (removed, stored) = store
            .replace_source(SourceType::Record, 1, vec![])
            .await
            .unwrap();
        assert_eq!((removed, stored.len()), (1, 0));
    }

    #[tokio::test]
    async fn test_replace_source_keeps_rows_when_embedding_fails() {
        let embedder = Arc::new(KeywordEmbedder::new(vec!["sleep"]));
        let store = InMemoryVectorStore::new(embedder.clone());
        let stored = store
            .add(chunk("sleep", SourceType::Record, 1, 1))
            .await
            .unwrap();
        embedder.set_failing(true);

        let result = store
            .replace_source(
                SourceType::Record,
                1,
                vec![chunk("sleep again", SourceType::Record, 1, 1)],
            )
            .await;

        assert!(matches!(result, Err(VectorStoreError::EmbeddingError(_))));
        assert_eq!(
            store.get_by_source(SourceType::Record, 1).await.unwrap(),
            vec![stored]
        );
    }

    #[tokio::test]
    async fn test_update_recomputes_embedding() {
        let store = store();
        let stored = store
            .add(chunk("feeding", SourceType::Record, 1, 1))
            .await
            .unwrap();

        assert!(store
            .update(stored.id, "teeth coming in", Some(json!({"edited": true})))
            .await
            .unwrap());
        assert!(!store.update(999, "teeth", None).await.unwrap());

        let updated = store.get_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(updated.content, "teeth coming in");
        assert_eq!(updated.metadata, json!({"edited": true}));
        assert_ne!(updated.embedding, stored.embedding);
    }

    #[tokio::test]
    async fn test_deletes_report_counts() {
        let store = store();
        store
            .add_batch(vec![
                chunk("sleep part one", SourceType::Record, 1, 1),
                chunk("sleep part two", SourceType::Record, 1, 1),
                chunk("rash", SourceType::Record, 2, 1),
                chunk("teeth", SourceType::Record, 3, 2),
            ])
            .await
            .unwrap();

        assert_eq!(store.get_by_source(SourceType::Record, 1).await.unwrap().len(), 2);
        assert_eq!(store.delete_by_source(SourceType::Record, 1).await.unwrap(), 2);
        assert_eq!(store.delete_by_source(SourceType::Record, 1).await.unwrap(), 0);
        assert_eq!(store.count(Some(1)).await.unwrap(), 1);
        assert_eq!(store.delete_by_child_id(2).await.unwrap(), 1);
        assert!(!store.delete(12345).await.unwrap());
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_older_than_and_pagination() {
        let store = store();
        let stored = store
            .add_batch(vec![
                chunk("sleep", SourceType::Record, 1, 1),
                chunk("rash", SourceType::Record, 2, 1),
                chunk("teeth", SourceType::Record, 3, 1),
            ])
            .await
            .unwrap();

        store
            .backdate(stored[0].id, Utc::now() - Duration::days(400))
            .await;

        let page = store.get_by_child_id(1, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);

        let removed = store
            .delete_older_than(Utc::now() - Duration::days(365))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Some(1)).await.unwrap(), 2);
    }
}
