use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::entities::{
    ChatHistory, Child, Context, DailyRecord, RelevantChat, RelevantRecord, ScoredChunk,
    VectorSearchHit,
};
use crate::domain::repositories::{
    ChatHistoryRepository, ChildRepository, RecordRepository, RepositoryError, VectorStore,
};
use crate::domain::value_objects::SourceType;

#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    pub search_limit: usize,
    pub similarity_threshold: f32,
    /// Upper bound on concurrent record/chat lookups while hydrating hits.
    pub hydration_concurrency: usize,
    pub fallback_chat_limit: i64,
    pub overview_chat_limit: i64,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            search_limit: 10,
            similarity_threshold: 0.6,
            hydration_concurrency: 8,
            fallback_chat_limit: 5,
            overview_chat_limit: 3,
        }
    }
}

/// Builds the per-request [`Context`].
///
/// With a child, the vector path (profile, similarity search, hydration) runs
/// first. Any failure there other than an ownership refusal is logged and
/// replaced by the unscored fallback, which leaves `vector_search_results`
/// as `None`.
pub struct ContextAssembler {
    child_repository: Arc<dyn ChildRepository>,
    record_repository: Arc<dyn RecordRepository>,
    chat_repository: Arc<dyn ChatHistoryRepository>,
    vector_store: Arc<dyn VectorStore>,
    settings: AssemblerSettings,
}

struct VectorPath {
    hits: Vec<VectorSearchHit>,
    records: Vec<RelevantRecord>,
    chats: Vec<RelevantChat>,
}

impl ContextAssembler {
    pub fn new(
        child_repository: Arc<dyn ChildRepository>,
        record_repository: Arc<dyn RecordRepository>,
        chat_repository: Arc<dyn ChatHistoryRepository>,
        vector_store: Arc<dyn VectorStore>,
        settings: AssemblerSettings,
    ) -> Self {
        Self {
            child_repository,
            record_repository,
            chat_repository,
            vector_store,
            settings,
        }
    }

    pub async fn build_context(
        &self,
        user_id: i64,
        child_id: Option<i64>,
        query: &str,
        today: NaiveDate,
    ) -> Result<Context, RepositoryError> {
        match child_id {
            Some(child_id) => self.child_context(user_id, child_id, query, today).await,
            None => self.overview_context(user_id, today).await,
        }
    }

    async fn child_context(
        &self,
        user_id: i64,
        child_id: i64,
        query: &str,
        today: NaiveDate,
    ) -> Result<Context, RepositoryError> {
        let child = match self.child_repository.find_one(child_id, user_id).await {
            Ok(child) => Some(child),
            Err(RepositoryError::Forbidden(message)) => {
                return Err(RepositoryError::Forbidden(message));
            }
            Err(e) => {
                warn!(child_id, error = %e, "Child profile lookup failed");
                None
            }
        };

        let vector_path = match &child {
            Some(child) => self.vector_path(user_id, child, query).await,
            None => Err("child profile unavailable".to_string()),
        };

        let mut context = Context {
            child: child.as_ref().map(|c| c.summary(today)),
            ..Default::default()
        };

        match vector_path {
            Ok(path) => {
                debug!(
                    child_id,
                    hits = path.hits.len(),
                    records = path.records.len(),
                    chats = path.chats.len(),
                    "Vector context assembled"
                );
                context.vector_search_results = Some(path.hits);
                context.relevant_records = path.records;
                context.relevant_chat_history = path.chats;
            }
            Err(cause) => {
                warn!(child_id, cause = %cause, "Vector retrieval unavailable, using fallback context");
                context.relevant_records = self
                    .record_repository
                    .find_all_by_child(child_id)
                    .await?
                    .into_iter()
                    .map(|record| RelevantRecord {
                        record,
                        similarity: None,
                    })
                    .collect();
                context.relevant_chat_history = self
                    .chat_repository
                    .get_chat_history(user_id, Some(child_id), self.settings.fallback_chat_limit)
                    .await?
                    .into_iter()
                    .map(|chat| RelevantChat {
                        chat,
                        similarity: None,
                    })
                    .collect();
            }
        }

        Ok(context)
    }

    async fn overview_context(
        &self,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Context, RepositoryError> {
        let children = self.child_repository.find_all(user_id).await?;
        let recent_chats = self
            .chat_repository
            .get_chat_history(user_id, None, self.settings.overview_chat_limit)
            .await?;

        Ok(Context {
            available_children: Some(children.iter().map(|c| c.list_item(today)).collect()),
            recent_chats: Some(recent_chats),
            ..Default::default()
        })
    }

    async fn vector_path(
        &self,
        user_id: i64,
        child: &Child,
        query: &str,
    ) -> Result<VectorPath, String> {
        let scored = self
            .vector_store
            .search(
                query,
                child.id,
                self.settings.search_limit,
                self.settings.similarity_threshold,
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        let record_ids = distinct_sources(&scored, SourceType::Record);
        let chat_ids = distinct_sources(&scored, SourceType::ChatHistory);
        let concurrency = self.settings.hydration_concurrency.max(1);

        let records = stream::iter(record_ids)
            .map(|(id, similarity)| async move {
                self.record_repository
                    .find_one(id)
                    .await
                    .map(|found| found.map(|record| (record, similarity)))
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<Result<Option<(DailyRecord, f32)>, RepositoryError>>>()
            .await;

        let chats = stream::iter(chat_ids)
            .map(|(id, similarity)| async move {
                self.chat_repository
                    .find_one(id)
                    .await
                    .map(|found| found.map(|chat| (chat, similarity)))
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<Result<Option<(ChatHistory, f32)>, RepositoryError>>>()
            .await;

        let mut records: Vec<RelevantRecord> = records
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?
            .into_iter()
            .flatten()
            .filter(|(record, _)| record.child_id == child.id)
            .map(|(record, similarity)| RelevantRecord {
                record,
                similarity: Some(similarity),
            })
            .collect();
        records.sort_by(|a, b| by_score_then_id(a.similarity, b.similarity, a.record.id, b.record.id));

        let mut chats: Vec<RelevantChat> = chats
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?
            .into_iter()
            .flatten()
            .filter(|(chat, _)| chat.is_owned_by(user_id))
            .map(|(chat, similarity)| RelevantChat {
                chat,
                similarity: Some(similarity),
            })
            .collect();
        chats.sort_by(|a, b| by_score_then_id(a.similarity, b.similarity, a.chat.id, b.chat.id));

        let hits = scored
            .into_iter()
            .map(|hit| VectorSearchHit {
                content: hit.chunk.content,
                source_type: hit.chunk.source_type,
                source_id: hit.chunk.source_id,
                similarity: hit.similarity,
                metadata: hit.chunk.metadata,
            })
            .collect();

        Ok(VectorPath {
            hits,
            records,
            chats,
        })
    }
}

/// Distinct source ids of one type, each with its best score. Hits arrive
/// best first, so the first occurrence wins.
fn distinct_sources(hits: &[ScoredChunk], source_type: SourceType) -> Vec<(i64, f32)> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| hit.chunk.source_type == source_type)
        .filter(|hit| seen.insert(hit.chunk.source_id))
        .map(|hit| (hit.chunk.source_id, hit.similarity))
        .collect()
}

fn by_score_then_id(a: Option<f32>, b: Option<f32>, a_id: i64, b_id: i64) -> Ordering {
    b.partial_cmp(&a)
        .unwrap_or(Ordering::Equal)
        .then(a_id.cmp(&b_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NewTextChunk;
    use crate::domain::repositories::chat_history_repository::MockChatHistoryRepository;
    use crate::domain::repositories::child_repository::MockChildRepository;
    use crate::domain::repositories::record_repository::MockRecordRepository;
    use crate::infrastructure::vector::InMemoryVectorStore;
    use crate::infrastructure::vector::in_memory_vector_store::test_support::KeywordEmbedder;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn child(id: i64, user_id: i64) -> Child {
        Child {
            id,
            user_id,
            name: "Leo".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
            gender: None,
            allergy_info: vec!["Milk".to_string()],
            notes: None,
        }
    }

    fn record(id: i64, child_id: i64) -> DailyRecord {
        DailyRecord {
            id,
            child_id,
            record_type: "sleep".to_string(),
            note: Some(format!("record {}", id)),
            details: json!({}),
            recorded_at: Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap(),
        }
    }

    fn chat(id: i64, user_id: i64) -> ChatHistory {
        let at = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();
        ChatHistory {
            id,
            user_id,
            child_id: Some(1),
            user_message: "How long should naps be?".to_string(),
            ai_response: "About an hour.".to_string(),
            raw_ai_response: "About an hour.".to_string(),
            context_summary: vec![],
            safety_flags: String::new(),
            feedback: None,
            request_timestamp: at,
            response_timestamp: at,
        }
    }

    fn assembler(
        children: MockChildRepository,
        records: MockRecordRepository,
        chats: MockChatHistoryRepository,
        store: Arc<dyn VectorStore>,
    ) -> ContextAssembler {
        ContextAssembler::new(
            Arc::new(children),
            Arc::new(records),
            Arc::new(chats),
            store,
            AssemblerSettings::default(),
        )
    }

    fn owned_child() -> MockChildRepository {
        let mut children = MockChildRepository::new();
        children
            .expect_find_one()
            .returning(|child_id, user_id| Ok(child(child_id, user_id)));
        children
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new(Arc::new(KeywordEmbedder::new(vec![
            "nap", "sleep", "feeding",
        ]))));
        store
            .add_batch(vec![
                NewTextChunk::new("nap sleep at noon", SourceType::Record, 10, 1),
                NewTextChunk::new("sleep nap question", SourceType::ChatHistory, 20, 1),
                NewTextChunk::new("nap sleep for another child", SourceType::Record, 30, 2),
                NewTextChunk::new("feeding bottle", SourceType::Record, 11, 1),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_vector_path_hydrates_and_scopes_to_child() {
        let mut records = MockRecordRepository::new();
        records
            .expect_find_one()
            .withf(|id| *id == 10)
            .times(1)
            .returning(|id| Ok(Some(record(id, 1))));
        records.expect_find_all_by_child().never();

        let mut chats = MockChatHistoryRepository::new();
        chats
            .expect_find_one()
            .withf(|id| *id == 20)
            .times(1)
            .returning(|id| Ok(Some(chat(id, 7))));
        chats.expect_get_chat_history().never();

        let store = seeded_store().await;
        let assembler = assembler(owned_child(), records, chats, store);

        let context = assembler
            .build_context(7, Some(1), "nap sleep", today())
            .await
            .unwrap();

        let hits = context.vector_search_results.as_ref().unwrap();
        assert!(hits.iter().all(|h| h.similarity >= 0.6));
        assert!(hits.iter().all(|h| h.source_id != 30));
        assert_eq!(context.relevant_records.len(), 1);
        assert_eq!(context.relevant_records[0].record.id, 10);
        assert!(context.relevant_records[0].similarity.is_some());
        assert_eq!(context.relevant_chat_history[0].chat.id, 20);
        assert_eq!(context.child.as_ref().unwrap().age_in_months, 9);
        assert!(!context.used_fallback());
    }

    #[tokio::test]
    async fn test_search_failure_falls_back_without_error() {
        let mut records = MockRecordRepository::new();
        records
            .expect_find_all_by_child()
            .withf(|child_id| *child_id == 1)
            .returning(|child_id| Ok(vec![record(1, child_id), record(2, child_id)]));

        let mut chats = MockChatHistoryRepository::new();
        chats
            .expect_get_chat_history()
            .withf(|user_id, child_id, limit| *user_id == 7 && *child_id == Some(1) && *limit == 5)
            .returning(|user_id, _, _| Ok(vec![chat(3, user_id)]));

        let store = Arc::new(InMemoryVectorStore::new(Arc::new(KeywordEmbedder::failing())));
        let assembler = assembler(owned_child(), records, chats, store);

        let context = assembler
            .build_context(7, Some(1), "nap", today())
            .await
            .unwrap();

        assert!(context.vector_search_results.is_none());
        assert!(context.used_fallback());
        assert_eq!(context.relevant_records.len(), 2);
        assert!(context.relevant_records.iter().all(|r| r.similarity.is_none()));
        assert_eq!(context.relevant_chat_history.len(), 1);
        assert!(context.child.is_some());
    }

    #[tokio::test]
    async fn test_empty_search_is_not_fallback() {
        let store = seeded_store().await;
        let assembler = assembler(
            owned_child(),
            MockRecordRepository::new(),
            MockChatHistoryRepository::new(),
            store,
        );

        let context = assembler
            .build_context(7, Some(1), "teething", today())
            .await
            .unwrap();

        assert_eq!(context.vector_search_results, Some(Vec::new()));
        assert!(!context.used_fallback());
    }

    #[tokio::test]
    async fn test_missing_profile_uses_fallback() {
        let mut children = MockChildRepository::new();
        children
            .expect_find_one()
            .returning(|child_id, _| Err(RepositoryError::NotFound(format!("child {}", child_id))));

        let mut records = MockRecordRepository::new();
        records.expect_find_all_by_child().returning(|_| Ok(vec![]));
        let mut chats = MockChatHistoryRepository::new();
        chats.expect_get_chat_history().returning(|_, _, _| Ok(vec![]));

        let store = seeded_store().await;
        let assembler = assembler(children, records, chats, store);

        let context = assembler
            .build_context(7, Some(1), "nap", today())
            .await
            .unwrap();

        assert!(context.child.is_none());
        assert!(context.vector_search_results.is_none());
    }

    #[tokio::test]
    async fn test_foreign_child_is_refused() {
        let mut children = MockChildRepository::new();
        children
            .expect_find_one()
            .returning(|_, _| Err(RepositoryError::Forbidden("not yours".to_string())));

        let mut records = MockRecordRepository::new();
        records.expect_find_all_by_child().never();

        let store = seeded_store().await;
        let assembler = assembler(children, records, MockChatHistoryRepository::new(), store);

        let result = assembler.build_context(7, Some(1), "nap", today()).await;
        assert!(matches!(result, Err(RepositoryError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_overview_without_child() {
        let mut children = MockChildRepository::new();
        children
            .expect_find_all()
            .returning(|user_id| Ok(vec![child(1, user_id), child(2, user_id)]));
        children.expect_find_one().never();

        let mut chats = MockChatHistoryRepository::new();
        chats
            .expect_get_chat_history()
            .withf(|_, child_id, limit| child_id.is_none() && *limit == 3)
            .returning(|user_id, _, _| Ok(vec![chat(1, user_id)]));

        let store = Arc::new(InMemoryVectorStore::new(Arc::new(KeywordEmbedder::failing())));
        let assembler = assembler(children, MockRecordRepository::new(), chats, store);

        let context = assembler.build_context(7, None, "hi", today()).await.unwrap();

        assert_eq!(context.available_children.as_ref().unwrap().len(), 2);
        assert_eq!(context.recent_chats.as_ref().unwrap().len(), 1);
        assert!(context.vector_search_results.is_none());
        assert!(!context.used_fallback());
    }
}
