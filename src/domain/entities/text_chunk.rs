use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::SourceType;

/// A stored unit of grounding text together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: i64,
    pub content: String,
    pub source_type: SourceType,
    pub source_id: i64,
    pub child_id: i64,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TextChunk {
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }

    pub fn belongs_to_child(&self, child_id: i64) -> bool {
        self.child_id == child_id
    }

    pub fn is_from_source(&self, source_type: SourceType, source_id: i64) -> bool {
        self.source_type == source_type && self.source_id == source_id
    }
}

/// Chunk content awaiting embedding and insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTextChunk {
    pub content: String,
    pub source_type: SourceType,
    pub source_id: i64,
    pub child_id: i64,
    pub metadata: serde_json::Value,
}

impl NewTextChunk {
    pub fn new(
        content: impl Into<String>,
        source_type: SourceType,
        source_id: i64,
        child_id: i64,
    ) -> Self {
        Self {
            content: content.into(),
            source_type,
            source_id,
            child_id,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// One ranked hit from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_defaults_to_empty_metadata() {
        let chunk = NewTextChunk::new("slept 3 hours", SourceType::Record, 7, 1);
        assert_eq!(chunk.metadata, serde_json::json!({}));
        assert!(!chunk.is_empty());
        assert!(NewTextChunk::new("   ", SourceType::Record, 7, 1).is_empty());
    }
}
