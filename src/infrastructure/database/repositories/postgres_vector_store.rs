use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{AsSelect, SqlTypeOf};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Double;
use pgvector::{Vector, VectorExpressionMethods};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::ports::Embedder;
use crate::domain::entities::{NewTextChunk, ScoredChunk, TextChunk};
use crate::domain::repositories::vector_store::{
    validate_content, validate_new_chunks, validate_replacement,
};
use crate::domain::repositories::{VectorStore, VectorStoreError};
use crate::domain::value_objects::{SearchFilters, SourceType};
use crate::infrastructure::database::connection::DatabaseError;
use crate::infrastructure::database::models::{
    NewTextChunkModel, TextChunkChangeset, TextChunkModel,
};
use crate::infrastructure::database::schema::text_chunks;
use crate::infrastructure::database::{DbPool, with_connection};

type SearchQuery =
    text_chunks::BoxedQuery<'static, Pg, (SqlTypeOf<AsSelect<TextChunkModel, Pg>>, Double)>;

/// pgvector-backed store. Ranking, thresholding and filtering all run in SQL
/// with bound parameters; similarity is `1 - cosine_distance`.
pub struct PostgresVectorStore {
    pool: DbPool,
    embedder: Arc<dyn Embedder>,
}

impl PostgresVectorStore {
    pub fn new(pool: DbPool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
        self.embedder
            .embed(text)
            .await
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))
    }

    /// Embeds every chunk up front; no row is written here.
    async fn embed_chunks(
        &self,
        chunks: Vec<NewTextChunk>,
    ) -> Result<Vec<NewTextChunkModel>, VectorStoreError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| VectorStoreError::EmbeddingError(e.to_string()))?;

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
            .map(|(chunk, embedding)| NewTextChunkModel::from_domain(chunk, embedding))
            .collect())
    }
}

fn delete_source(
    conn: &mut PgConnection,
    source_type: SourceType,
    source_id: i64,
) -> QueryResult<usize> {
    diesel::delete(
        text_chunks::table
            .filter(text_chunks::source_type.eq(source_type.as_str()))
            .filter(text_chunks::source_id.eq(source_id)),
    )
    .execute(conn)
}

fn insert_chunks(
    conn: &mut PgConnection,
    new_chunks: &[NewTextChunkModel],
) -> Result<Vec<TextChunk>, DatabaseError> {
    if new_chunks.is_empty() {
        return Ok(Vec::new());
    }
    let models = diesel::insert_into(text_chunks::table)
        .values(new_chunks)
        .returning(TextChunkModel::as_returning())
        .get_results(conn)?;
    models.into_iter().map(to_domain).collect()
}

fn db_error(e: DatabaseError) -> VectorStoreError {
    VectorStoreError::DatabaseError(e.to_string())
}

fn to_domain(model: TextChunkModel) -> Result<TextChunk, DatabaseError> {
    TextChunk::try_from(model).map_err(DatabaseError::ConfigurationError)
}

/// Child scope, threshold and optional filters over one query embedding.
/// Ties on distance fall back to insertion order.
pub fn build_search_query(
    query_embedding: Vec<f32>,
    child_id: i64,
    limit: usize,
    threshold: f32,
    filters: Option<&SearchFilters>,
) -> SearchQuery {
    let query_vector = Vector::from(query_embedding);
    let distance = || text_chunks::embedding.cosine_distance(query_vector.clone());
    let max_distance = 1.0 - f64::from(threshold);

    let mut query = text_chunks::table
        .select((TextChunkModel::as_select(), distance()))
        .filter(text_chunks::child_id.eq(child_id))
        .filter(distance().le(max_distance))
        .into_boxed();

    if let Some(filters) = filters {
        if let Some(types) = &filters.source_types {
            let names: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            query = query.filter(text_chunks::source_type.eq_any(names));
        }
        if let Some(after) = filters.created_after {
            query = query.filter(text_chunks::created_at.ge(after));
        }
        if let Some(before) = filters.created_before {
            query = query.filter(text_chunks::created_at.le(before));
        }
        for filter in &filters.metadata {
            match filter.value.as_json() {
                Some(expected) => {
                    let mut fragment = Map::new();
                    fragment.insert(filter.key.clone(), expected);
                    query = query.filter(text_chunks::metadata.contains(Value::Object(fragment)));
                }
                None => {
                    let candidates = filter.value.candidate_texts();
                    query = query.filter(
                        text_chunks::metadata
                            .retrieve_as_text(filter.key.clone())
                            .eq_any(candidates),
                    );
                }
            }
        }
    }

    query
        .order((distance().asc(), text_chunks::id.asc()))
        .limit(limit as i64)
}

#[async_trait]
impl VectorStore for PostgresVectorStore {
    async fn add(&self, chunk: NewTextChunk) -> Result<TextChunk, VectorStoreError> {
        validate_content(&chunk.content)?;
        let embedding = self.embed(&chunk.content).await?;
        let new_chunk = NewTextChunkModel::from_domain(chunk, embedding);

        with_connection(&self.pool, move |conn| {
            let model = diesel::insert_into(text_chunks::table)
                .values(&new_chunk)
                .returning(TextChunkModel::as_returning())
                .get_result(conn)?;
            to_domain(model)
        })
        .await
        .map_err(db_error)
    }

    async fn add_batch(
        &self,
        chunks: Vec<NewTextChunk>,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        validate_new_chunks(&chunks)?;
        let new_chunks = self.embed_chunks(chunks).await?;

        let stored = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| insert_chunks(conn, &new_chunks))
        })
        .await
        .map_err(db_error)?;

        debug!(count = stored.len(), "Stored chunk batch");
        Ok(stored)
    }

    async fn replace_source(
        &self,
        source_type: SourceType,
        source_id: i64,
        chunks: Vec<NewTextChunk>,
    ) -> Result<(u64, Vec<TextChunk>), VectorStoreError> {
        validate_replacement(source_type, source_id, &chunks)?;

        // Embed before opening the transaction so provider failures leave the
        // existing rows untouched.
        let new_chunks = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embed_chunks(chunks).await?
        };

        let (removed, stored) = with_connection(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let removed = delete_source(conn, source_type, source_id)?;
                let stored = insert_chunks(conn, &new_chunks)?;
                Ok((removed as u64, stored))
            })
        })
        .await
        .map_err(db_error)?;

        debug!(%source_type, source_id, removed, stored = stored.len(), "Replaced source chunks");
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
        let query_embedding = self.embed(query_text).await?;
        if query_embedding.len() != self.embedder.dimension() {
            warn!(
                expected = self.embedder.dimension(),
                actual = query_embedding.len(),
                "Query embedding dimension differs from configuration"
            );
        }

        let query = build_search_query(query_embedding, child_id, limit, threshold, filters);

        let rows = with_connection(&self.pool, move |conn| {
            let rows: Vec<(TextChunkModel, f64)> = query.load(conn)?;
            rows.into_iter()
                .map(|(model, distance)| {
                    Ok(ScoredChunk {
                        chunk: to_domain(model)?,
                        similarity: (1.0 - distance) as f32,
                    })
                })
                .collect::<Result<Vec<_>, DatabaseError>>()
        })
        .await
        .map_err(db_error)?;

        debug!(child_id, hits = rows.len(), "Vector search completed");
        Ok(rows)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TextChunk>, VectorStoreError> {
        with_connection(&self.pool, move |conn| {
            text_chunks::table
                .find(id)
                .select(TextChunkModel::as_select())
                .first::<TextChunkModel>(conn)
                .optional()?
                .map(to_domain)
                .transpose()
        })
        .await
        .map_err(db_error)
    }

    async fn get_by_source(
        &self,
        source_type: SourceType,
        source_id: i64,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        with_connection(&self.pool, move |conn| {
            text_chunks::table
                .filter(text_chunks::source_type.eq(source_type.as_str()))
                .filter(text_chunks::source_id.eq(source_id))
                .order(text_chunks::id.asc())
                .select(TextChunkModel::as_select())
                .load::<TextChunkModel>(conn)?
                .into_iter()
                .map(to_domain)
                .collect()
        })
        .await
        .map_err(db_error)
    }

    async fn get_by_child_id(
        &self,
        child_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TextChunk>, VectorStoreError> {
        with_connection(&self.pool, move |conn| {
            text_chunks::table
                .filter(text_chunks::child_id.eq(child_id))
                .order((text_chunks::created_at.desc(), text_chunks::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(TextChunkModel::as_select())
                .load::<TextChunkModel>(conn)?
                .into_iter()
                .map(to_domain)
                .collect()
        })
        .await
        .map_err(db_error)
    }

    async fn update(
        &self,
        id: i64,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<bool, VectorStoreError> {
        validate_content(content)?;
        let embedding = self.embed(content).await?;
        let changes = TextChunkChangeset {
            content: content.to_string(),
            metadata,
            embedding: Vector::from(embedding),
            updated_at: Utc::now(),
        };

        let updated = with_connection(&self.pool, move |conn| {
            Ok(diesel::update(text_chunks::table.find(id))
                .set(&changes)
                .execute(conn)?)
        })
        .await
        .map_err(db_error)?;

        Ok(updated > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, VectorStoreError> {
        let deleted = with_connection(&self.pool, move |conn| {
            Ok(diesel::delete(text_chunks::table.find(id)).execute(conn)?)
        })
        .await
        .map_err(db_error)?;

        Ok(deleted > 0)
    }

    async fn delete_by_source(
        &self,
        source_type: SourceType,
        source_id: i64,
    ) -> Result<u64, VectorStoreError> {
        let deleted = with_connection(&self.pool, move |conn| {
            Ok(delete_source(conn, source_type, source_id)?)
        })
        .await
        .map_err(db_error)?;

        Ok(deleted as u64)
    }

    async fn delete_by_child_id(&self, child_id: i64) -> Result<u64, VectorStoreError> {
        let deleted = with_connection(&self.pool, move |conn| {
            Ok(
                diesel::delete(text_chunks::table.filter(text_chunks::child_id.eq(child_id)))
                    .execute(conn)?,
            )
        })
        .await
        .map_err(db_error)?;

        Ok(deleted as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, VectorStoreError> {
        let deleted = with_connection(&self.pool, move |conn| {
            Ok(
                diesel::delete(text_chunks::table.filter(text_chunks::created_at.lt(cutoff)))
                    .execute(conn)?,
            )
        })
        .await
        .map_err(db_error)?;

        Ok(deleted as u64)
    }

    async fn count(&self, child_id: Option<i64>) -> Result<u64, VectorStoreError> {
        let total = with_connection(&self.pool, move |conn| {
            let mut query = text_chunks::table.count().into_boxed();
            if let Some(child_id) = child_id {
                query = query.filter(text_chunks::child_id.eq(child_id));
            }
            Ok(query.get_result::<i64>(conn)?)
        })
        .await
        .map_err(db_error)?;

        Ok(total as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::MetadataMatch;
    use serde_json::json;

    fn sql_of(query: &SearchQuery) -> (String, String) {
        let rendered = diesel::debug_query::<Pg, _>(query).to_string();
        match rendered.split_once("-- binds:") {
            Some((sql, binds)) => (sql.to_string(), binds.to_string()),
            None => (rendered, String::new()),
        }
    }

    #[test]
    fn test_search_query_ranks_by_cosine_distance_within_child() {
        let query = build_search_query(vec![0.1, 0.2, 0.3], 7, 5, 0.6, None);
        let (sql, binds) = sql_of(&query);

        assert!(sql.contains("<=>"));
        assert!(sql.contains("\"text_chunks\".\"child_id\" = $"));
        assert!(sql.contains("ORDER BY"));
        assert!(sql.contains("\"text_chunks\".\"id\" ASC"));
        assert!(sql.contains("LIMIT"));
        assert!(binds.contains('7'));
    }

    #[test]
    fn test_filter_values_are_bound_not_inlined() {
        let filters = SearchFilters::default()
            .with_source_types(vec![SourceType::Record])
            .with_metadata(
                "recordType",
                MetadataMatch::Text("feeding'; DROP TABLE text_chunks; --".to_string()),
            )
            .with_metadata(
                "mood",
                MetadataMatch::OneOf(vec![json!("calm"), json!("fussy")]),
            );

        let query = build_search_query(vec![1.0, 0.0], 3, 10, 0.5, Some(&filters));
        let (sql, binds) = sql_of(&query);

        assert!(!sql.contains("DROP TABLE"));
        assert!(!sql.contains("feeding"));
        assert!(!sql.contains("fussy"));
        assert!(sql.contains("@>"));
        assert!(sql.contains("->>"));
        assert!(binds.contains("DROP TABLE"));
        assert!(binds.contains("fussy"));
        assert!(binds.contains("record"));
    }

    #[test]
    fn test_date_range_adds_bound_comparisons() {
        let now = Utc::now();
        let filters =
            SearchFilters::default().with_date_range(Some(now - chrono::Duration::days(7)), Some(now));

        let query = build_search_query(vec![1.0], 1, 3, 0.0, Some(&filters));
        let (sql, _) = sql_of(&query);

        assert!(sql.contains("\"text_chunks\".\"created_at\" >="));
        assert!(sql.contains("\"text_chunks\".\"created_at\" <="));
    }
}
