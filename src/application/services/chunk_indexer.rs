use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::entities::{ChatHistory, Child, DailyRecord, NewTextChunk};
use crate::domain::repositories::{
    ChildRepository, RecordRepository, RepositoryError, VectorStore, VectorStoreError,
};
use crate::domain::value_objects::SourceType;

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] VectorStoreError),
}

/// Overlapping word windows of `chunk_size` words. Consecutive windows share
/// `chunk_overlap` words; the window always advances by at least one word.
pub fn split_into_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let chunk_size = chunk_size.max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = std::cmp::min(start + chunk_size, words.len());
        windows.push(words[start..end].join(" "));

        if end >= words.len() {
            break;
        }
        start = std::cmp::max(end.saturating_sub(chunk_overlap), start + 1);
    }

    windows
}

/// Keeps the vector store in step with the source entities: every call
/// replaces all chunks of one source.
pub struct ChunkIndexer {
    child_repository: Arc<dyn ChildRepository>,
    record_repository: Arc<dyn RecordRepository>,
    vector_store: Arc<dyn VectorStore>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkIndexer {
    pub fn new(
        child_repository: Arc<dyn ChildRepository>,
        record_repository: Arc<dyn RecordRepository>,
        vector_store: Arc<dyn VectorStore>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            child_repository,
            record_repository,
            vector_store,
            chunk_size,
            chunk_overlap,
        }
    }

    pub async fn index_child(&self, child_id: i64) -> Result<usize, IndexingError> {
        let child = self
            .child_repository
            .find_by_id(child_id)
            .await?
            .ok_or_else(|| IndexingError::NotFound(format!("child {}", child_id)))?;

        let metadata = json!({
            "name": child.name,
            "gender": child.gender,
            "allergies": child.allergy_info,
        });

        self.replace(
            SourceType::ChildProfile,
            child.id,
            child.id,
            &profile_text(&child),
            metadata,
        )
        .await
    }

    pub async fn index_record(&self, record_id: i64) -> Result<usize, IndexingError> {
        let record = self
            .record_repository
            .find_one(record_id)
            .await?
            .ok_or_else(|| IndexingError::NotFound(format!("record {}", record_id)))?;

        self.index_loaded_record(&record).await
    }

    pub async fn index_loaded_record(&self, record: &DailyRecord) -> Result<usize, IndexingError> {
        let metadata = json!({
            "recordType": record.record_type,
            "recordedAt": record.recorded_at.to_rfc3339(),
        });

        self.replace(
            SourceType::Record,
            record.id,
            record.child_id,
            &record.describe(),
            metadata,
        )
        .await
    }

    /// Exchanges without a child have no scope in the store and are skipped.
    pub async fn index_chat(&self, chat: &ChatHistory) -> Result<usize, IndexingError> {
        let Some(child_id) = chat.child_id else {
            debug!(chat_id = chat.id, "Skipping indexing of chat without child");
            return Ok(0);
        };

        let metadata = json!({
            "userId": chat.user_id,
            "flagged": chat.was_flagged(),
        });

        self.replace(
            SourceType::ChatHistory,
            chat.id,
            child_id,
            &chat.exchange_text(),
            metadata,
        )
        .await
    }

    pub async fn remove_child(&self, child_id: i64) -> Result<u64, IndexingError> {
        let removed = self.vector_store.delete_by_child_id(child_id).await?;
        info!(child_id, removed, "Removed chunks for child");
        Ok(removed)
    }

    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, IndexingError> {
        Ok(self.vector_store.delete_older_than(cutoff).await?)
    }

    async fn replace(
        &self,
        source_type: SourceType,
        source_id: i64,
        child_id: i64,
        text: &str,
        metadata: Value,
    ) -> Result<usize, IndexingError> {
        let windows = split_into_windows(text, self.chunk_size, self.chunk_overlap);
        let chunks: Vec<NewTextChunk> = windows
            .into_iter()
            .enumerate()
            .map(|(index, content)| {
                let mut metadata = metadata.clone();
                if let Value::Object(map) = &mut metadata {
                    map.insert("chunkIndex".to_string(), json!(index));
                }
                NewTextChunk::new(content, source_type, source_id, child_id).with_metadata(metadata)
            })
            .collect();

        let (removed, stored) = self
            .vector_store
            .replace_source(source_type, source_id, chunks)
            .await?;
        info!(
            source_type = %source_type,
            source_id,
            removed,
            stored = stored.len(),
            "Indexed source"
        );
        Ok(stored.len())
    }
}

fn profile_text(child: &Child) -> String {
    let mut text = format!("{} was born on {}", child.name, child.birth_date.format("%Y-%m-%d"));
    if let Some(gender) = child.gender.as_deref().filter(|g| !g.trim().is_empty()) {
        text.push_str(&format!(" ({})", gender));
    }
    text.push('.');

    if child.allergy_info.is_empty() {
        text.push_str(" No known allergies.");
    } else {
        text.push_str(&format!(" Allergies: {}.", child.allergy_info.join(", ")));
    }
    if let Some(notes) = child.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        text.push_str(&format!(" Notes: {}", notes));
    }
    text
}
