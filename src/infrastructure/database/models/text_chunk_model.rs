use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;

use crate::domain::entities::{NewTextChunk, TextChunk};
use crate::infrastructure::database::schema::text_chunks;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = text_chunks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TextChunkModel {
    pub id: i64,
    pub content: String,
    pub source_type: String,
    pub source_id: i64,
    pub child_id: i64,
    pub metadata: serde_json::Value,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = text_chunks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewTextChunkModel {
    pub content: String,
    pub source_type: String,
    pub source_id: i64,
    pub child_id: i64,
    pub metadata: serde_json::Value,
    pub embedding: Vector,
}

impl NewTextChunkModel {
    pub fn from_domain(chunk: NewTextChunk, embedding: Vec<f32>) -> Self {
        Self {
            content: chunk.content,
            source_type: chunk.source_type.as_str().to_string(),
            source_id: chunk.source_id,
            child_id: chunk.child_id,
            metadata: chunk.metadata,
            embedding: Vector::from(embedding),
        }
    }
}

impl TryFrom<TextChunkModel> for TextChunk {
    type Error = String;

    fn try_from(model: TextChunkModel) -> Result<Self, Self::Error> {
        Ok(TextChunk {
            id: model.id,
            content: model.content,
            source_type: model.source_type.parse()?,
            source_id: model.source_id,
            child_id: model.child_id,
            metadata: model.metadata,
            embedding: model.embedding.to_vec(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Content edit; `metadata: None` leaves the stored metadata untouched.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = text_chunks)]
pub struct TextChunkChangeset {
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub embedding: Vector,
    pub updated_at: DateTime<Utc>,
}
