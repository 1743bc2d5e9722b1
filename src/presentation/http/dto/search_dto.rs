use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::use_cases::SearchChunksResponse;
use crate::domain::entities::ScoredChunk;
use crate::domain::value_objects::SourceType;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequestDto {
    pub query: String,
    pub limit: Option<usize>,
    pub similarity_threshold: Option<f32>,
    /// Comma separated, e.g. `record,chat_history`.
    pub source_types: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl SearchRequestDto {
    pub fn parsed_source_types(&self) -> Result<Option<Vec<SourceType>>, String> {
        let Some(raw) = self.source_types.as_deref() else {
            return Ok(None);
        };

        let types = raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse::<SourceType>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(if types.is_empty() { None } else { Some(types) })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponseDto {
    pub query: String,
    pub results: Vec<SearchResultDto>,
    pub total_results: usize,
    pub search_time_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultDto {
    pub chunk_id: i64,
    pub source_type: SourceType,
    pub source_id: i64,
    pub content: String,
    pub similarity_score: f32,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<SearchChunksResponse> for SearchResponseDto {
    fn from(response: SearchChunksResponse) -> Self {
        Self {
            query: response.query,
            results: response.results.into_iter().map(SearchResultDto::from).collect(),
            total_results: response.total_results,
            search_time_ms: response.search_time_ms,
        }
    }
}

impl From<ScoredChunk> for SearchResultDto {
    fn from(result: ScoredChunk) -> Self {
        Self {
            chunk_id: result.chunk.id,
            source_type: result.chunk.source_type,
            source_id: result.chunk.source_id,
            content: result.chunk.content,
            similarity_score: result.similarity,
            metadata: result.chunk.metadata,
            created_at: result.chunk.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexResponseDto {
    pub chunks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(source_types: Option<&str>) -> SearchRequestDto {
        SearchRequestDto {
            query: "sleep".to_string(),
            limit: None,
            similarity_threshold: None,
            source_types: source_types.map(str::to_string),
            created_after: None,
            created_before: None,
        }
    }

    #[test]
    fn test_source_types_parsing() {
        assert_eq!(dto(None).parsed_source_types(), Ok(None));
        assert_eq!(dto(Some(" , ")).parsed_source_types(), Ok(None));
        assert_eq!(
            dto(Some("record,chat_history")).parsed_source_types(),
            Ok(Some(vec![SourceType::Record, SourceType::ChatHistory]))
        );
        assert!(dto(Some("record,files")).parsed_source_types().is_err());
    }
}
