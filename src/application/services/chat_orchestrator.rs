use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use super::chunk_indexer::ChunkIndexer;
use super::context_assembler::ContextAssembler;
use super::prompt_formatter::format_context_to_prompt;
use super::safety::SafetyFilter;
use crate::application::ports::{ChatMessage, ChatModel, ProviderError};
use crate::domain::entities::{Context, NewChatHistory};
use crate::domain::repositories::{ChatHistoryRepository, RepositoryError};
use crate::domain::value_objects::{ChatStreamEvent, SafetyFlag};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Model provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Failed to save chat history: {0}")]
    Persistence(String),
    #[error("Failed to build context: {0}")]
    Context(String),
    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

impl From<RepositoryError> for ChatError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(message) => ChatError::NotFound(message),
            RepositoryError::Forbidden(message) => ChatError::Forbidden(message),
            RepositoryError::DatabaseError(message) => ChatError::Context(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub user_id: i64,
    pub child_id: Option<i64>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub chat_id: i64,
    pub response: String,
    pub safety_flags: Vec<String>,
    pub context_summary: Vec<String>,
}

/// Stages of one streamed exchange, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamPhase {
    BuildingContext,
    StreamingTokens,
    Finalizing,
    Done,
    Error,
}

/// Logs a cancelled exchange when the caller drops the stream early.
struct CancelGuard {
    span: Span,
    finished: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.span
                .in_scope(|| info!("Chat stream cancelled by caller, nothing persisted"));
        }
    }
}

/// Drives context building, generation, safety filtering and persistence for
/// one chat turn, either as a single call or as an event stream.
pub struct ChatOrchestrator {
    assembler: Arc<ContextAssembler>,
    chat_model: Arc<dyn ChatModel>,
    chat_repository: Arc<dyn ChatHistoryRepository>,
    safety: SafetyFilter,
    indexer: Option<Arc<ChunkIndexer>>,
    deadline: Option<Duration>,
}

impl ChatOrchestrator {
    pub fn new(
        assembler: Arc<ContextAssembler>,
        chat_model: Arc<dyn ChatModel>,
        chat_repository: Arc<dyn ChatHistoryRepository>,
    ) -> Self {
        Self {
            assembler,
            chat_model,
            chat_repository,
            safety: SafetyFilter::new(),
            indexer: None,
            deadline: None,
        }
    }

    /// Persisted exchanges are indexed in the background when set.
    pub fn with_indexer(mut self, indexer: Arc<ChunkIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Bounds context building plus generation; persistence is not counted.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn send_message(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let span = request_span(Uuid::new_v4(), &request);

        async move {
            let request_timestamp = Utc::now();
            let deadline = self.deadline_instant();

            let (context, raw) = within(deadline, async {
                let (context, messages) = self.prepare(&request).await?;
                let completion = self.chat_model.generate(&messages).await?;
                Ok::<_, ChatError>((context, completion.content))
            })
            .await?;

            self.finalize(&request, &context, raw, request_timestamp).await
        }
        .instrument(span)
        .await
    }

    /// Event stream for one exchange. Dropping the stream stops generation
    /// and skips persistence.
    pub fn stream_message(
        self: Arc<Self>,
        request: ChatRequest,
    ) -> BoxStream<'static, ChatStreamEvent> {
        let span = request_span(Uuid::new_v4(), &request);

        // The span is entered per await and per log call, never across a yield.
        let stream = async_stream::stream! {
            let mut guard = CancelGuard { span: span.clone(), finished: false };
            let request_timestamp = Utc::now();
            let deadline = self.deadline_instant();

            span.in_scope(|| log_phase(StreamPhase::BuildingContext));
            let prepared = within(deadline, self.prepare(&request))
                .instrument(span.clone())
                .await;
            let (context, messages) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    guard.finished = true;
                    span.in_scope(|| log_failure(&e));
                    yield error_event(&e);
                    return;
                }
            };

            let started = within(deadline, async {
                Ok::<_, ChatError>(self.chat_model.stream_generate(&messages).await?)
            })
            .instrument(span.clone())
            .await;
            let mut tokens = match started {
                Ok(tokens) => tokens,
                Err(e) => {
                    guard.finished = true;
                    span.in_scope(|| log_failure(&e));
                    yield error_event(&e);
                    return;
                }
            };

            span.in_scope(|| log_phase(StreamPhase::StreamingTokens));
            let mut accumulated = String::new();
            loop {
                let next: Option<Result<String, ChatError>> = async {
                    match deadline {
                        Some(at) => match tokio::time::timeout_at(at, tokens.next()).await {
                            Ok(next) => next.map(|t| t.map_err(ChatError::from)),
                            Err(_) => Some(Err(ChatError::DeadlineExceeded)),
                        },
                        None => tokens.next().await.map(|t| t.map_err(ChatError::from)),
                    }
                }
                .instrument(span.clone())
                .await;

                match next {
                    Some(Ok(token)) => {
                        accumulated.push_str(&token);
                        yield ChatStreamEvent::Content { content: token };
                    }
                    Some(Err(e)) => {
                        guard.finished = true;
                        span.in_scope(|| log_failure(&e));
                        yield error_event(&e);
                        return;
                    }
                    None => break,
                }
            }
            drop(tokens);

            span.in_scope(|| log_phase(StreamPhase::Finalizing));
            let finalized = self
                .finalize(&request, &context, accumulated, request_timestamp)
                .instrument(span.clone())
                .await;
            guard.finished = true;

            match finalized {
                Ok(reply) => {
                    span.in_scope(|| log_phase(StreamPhase::Done));
                    yield ChatStreamEvent::Done {
                        chat_id: reply.chat_id,
                        safety_flags: reply.safety_flags,
                    };
                }
                Err(e) => {
                    span.in_scope(|| log_failure(&e));
                    yield error_event(&e);
                }
            }
        };

        Box::pin(stream)
    }

    fn deadline_instant(&self) -> Option<Instant> {
        self.deadline.map(|d| Instant::now() + d)
    }

    async fn prepare(&self, request: &ChatRequest) -> Result<(Context, Vec<ChatMessage>), ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::InvalidInput("message must not be empty".to_string()));
        }

        let context = self
            .assembler
            .build_context(
                request.user_id,
                request.child_id,
                &request.message,
                Utc::now().date_naive(),
            )
            .await?;

        let messages = vec![
            ChatMessage::system(format_context_to_prompt(&context)),
            ChatMessage::user(request.message.trim()),
        ];
        Ok((context, messages))
    }

    async fn finalize(
        &self,
        request: &ChatRequest,
        context: &Context,
        raw: String,
        request_timestamp: DateTime<Utc>,
    ) -> Result<ChatReply, ChatError> {
        let filtered = self.safety.apply(&raw, context.child.as_ref());
        let context_summary = context.summary_lines();

        let chat = self
            .chat_repository
            .create_chat_history(NewChatHistory {
                user_id: request.user_id,
                child_id: request.child_id,
                user_message: request.message.clone(),
                ai_response: filtered.text,
                raw_ai_response: raw,
                context_summary,
                safety_flags: SafetyFlag::join(&filtered.flags),
                request_timestamp,
                response_timestamp: Utc::now(),
            })
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))?;

        info!(
            chat_id = chat.id,
            flags = %chat.safety_flags,
            fallback = context.used_fallback(),
            "Chat exchange persisted"
        );

        if let Some(indexer) = &self.indexer {
            let indexer = Arc::clone(indexer);
            let indexed = chat.clone();
            tokio::spawn(async move {
                if let Err(e) = indexer.index_chat(&indexed).await {
                    warn!(chat_id = indexed.id, error = %e, "Background chat indexing failed");
                }
            });
        }

        Ok(ChatReply {
            chat_id: chat.id,
            response: chat.ai_response,
            safety_flags: SafetyFlag::split(&chat.safety_flags),
            context_summary: chat.context_summary,
        })
    }
}

async fn within<T, F>(deadline: Option<Instant>, future: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, ChatError>>,
{
    match deadline {
        Some(at) => tokio::time::timeout_at(at, future)
            .await
            .unwrap_or(Err(ChatError::DeadlineExceeded)),
        None => future.await,
    }
}

fn error_event(error: &ChatError) -> ChatStreamEvent {
    ChatStreamEvent::Error {
        error: error.to_string(),
    }
}

/// One span per chat turn; every log line of the exchange nests under it.
fn request_span(request_id: Uuid, request: &ChatRequest) -> Span {
    info_span!(
        "chat",
        %request_id,
        user_id = request.user_id,
        child_id = ?request.child_id
    )
}

fn log_phase(phase: StreamPhase) {
    debug!(?phase, "Chat stream phase");
}

fn log_failure(error: &ChatError) {
    log_phase(StreamPhase::Error);
    warn!(error = %error, "Chat stream failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ChatCompletion, TokenStream};
    use crate::application::services::context_assembler::AssemblerSettings;
    use crate::domain::entities::{ChatHistory, Child};
    use crate::domain::repositories::VectorStore;
    use crate::domain::repositories::chat_history_repository::MockChatHistoryRepository;
    use crate::domain::repositories::child_repository::MockChildRepository;
    use crate::domain::repositories::record_repository::MockRecordRepository;
    use crate::infrastructure::vector::InMemoryVectorStore;
    use crate::infrastructure::vector::in_memory_vector_store::test_support::KeywordEmbedder;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Metadata, Subscriber};

    struct ScriptedChatModel {
        script: Vec<Result<String, ProviderError>>,
        hang_after_script: bool,
    }

    impl ScriptedChatModel {
        fn tokens(tokens: &[&str]) -> Self {
            Self {
                script: tokens.iter().map(|t| Ok(t.to_string())).collect(),
                hang_after_script: false,
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
            let content = self.script.iter().cloned().collect::<Result<String, _>>()?;
            Ok(ChatCompletion {
                content,
                finish_reason: Some("stop".to_string()),
                model: "scripted".to_string(),
            })
        }

        async fn stream_generate(
            &self,
            _messages: &[ChatMessage],
        ) -> Result<TokenStream, ProviderError> {
            let scripted = stream::iter(self.script.clone());
            if self.hang_after_script {
                Ok(Box::pin(scripted.chain(stream::pending())))
            } else {
                Ok(Box::pin(scripted))
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn milk_allergic_child(child_id: i64, user_id: i64) -> Child {
        Child {
            id: child_id,
            user_id,
            name: "Noa".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            gender: None,
            allergy_info: vec!["Milk".to_string()],
            notes: None,
        }
    }

    fn persisted(new: NewChatHistory) -> ChatHistory {
        ChatHistory {
            id: 42,
            user_id: new.user_id,
            child_id: new.child_id,
            user_message: new.user_message,
            ai_response: new.ai_response,
            raw_ai_response: new.raw_ai_response,
            context_summary: new.context_summary,
            safety_flags: new.safety_flags,
            feedback: None,
            request_timestamp: new.request_timestamp,
            response_timestamp: new.response_timestamp,
        }
    }

    fn assembler(children: MockChildRepository, records: MockRecordRepository) -> Arc<ContextAssembler> {
        let mut chats = MockChatHistoryRepository::new();
        chats.expect_get_chat_history().returning(|_, _, _| Ok(vec![]));
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(Arc::new(
            KeywordEmbedder::new(vec!["snack"]),
        )));

        Arc::new(ContextAssembler::new(
            Arc::new(children),
            Arc::new(records),
            Arc::new(chats),
            store,
            AssemblerSettings::default(),
        ))
    }

    fn owning_children() -> MockChildRepository {
        let mut children = MockChildRepository::new();
        children
            .expect_find_one()
            .returning(|child_id, user_id| Ok(milk_allergic_child(child_id, user_id)));
        children
    }

    fn capturing_repository(saved: Arc<Mutex<Vec<NewChatHistory>>>) -> MockChatHistoryRepository {
        let mut chats = MockChatHistoryRepository::new();
        chats.expect_create_chat_history().returning(move |new| {
            saved.lock().unwrap().push(new.clone());
            Ok(persisted(new))
        });
        chats
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            user_id: 7,
            child_id: Some(3),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_stream_forwards_tokens_filters_and_persists() {
        let saved = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            assembler(owning_children(), MockRecordRepository::new()),
            Arc::new(ScriptedChatModel::tokens(&["Try ", "some ", "cheese."])),
            Arc::new(capturing_repository(saved.clone())),
        ));

        let events: Vec<ChatStreamEvent> = orchestrator
            .stream_message(request("snack ideas?"))
            .collect()
            .await;

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ChatStreamEvent::Content {
                content: "Try ".to_string()
            }
        );
        assert_eq!(
            events[3],
            ChatStreamEvent::Done {
                chat_id: 42,
                safety_flags: vec!["allergy:Milk(cheese)".to_string()],
            }
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].raw_ai_response, "Try some cheese.");
        assert!(saved[0].ai_response.starts_with("Try some cheese."));
        assert!(saved[0].ai_response.contains("Allergy warning"));
        assert!(saved[0].ai_response.contains("tailored for Noa"));
        assert!(saved[0].safety_flags.contains("Milk"));
        assert!(saved[0].safety_flags.contains("cheese"));
    }

    #[tokio::test]
    async fn test_context_failure_yields_single_error_event() {
        let mut children = MockChildRepository::new();
        children
            .expect_find_one()
            .returning(|_, _| Err(RepositoryError::DatabaseError("pool exhausted".to_string())));
        let mut records = MockRecordRepository::new();
        records
            .expect_find_all_by_child()
            .returning(|_| Err(RepositoryError::DatabaseError("pool exhausted".to_string())));

        let mut chats = MockChatHistoryRepository::new();
        chats.expect_create_chat_history().never();

        let orchestrator = Arc::new(ChatOrchestrator::new(
            assembler(children, records),
            Arc::new(ScriptedChatModel::tokens(&["unused"])),
            Arc::new(chats),
        ));

        let events: Vec<ChatStreamEvent> = orchestrator
            .stream_message(request("snack ideas?"))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChatStreamEvent::Error { error } if error.contains("pool exhausted")));
    }

    #[tokio::test]
    async fn test_provider_error_mid_stream_is_terminal() {
        let mut chats = MockChatHistoryRepository::new();
        chats.expect_create_chat_history().never();

        let model = ScriptedChatModel {
            script: vec![
                Ok("Hel".to_string()),
                Err(ProviderError::NetworkError("reset".to_string())),
            ],
            hang_after_script: false,
        };
        let orchestrator = Arc::new(ChatOrchestrator::new(
            assembler(owning_children(), MockRecordRepository::new()),
            Arc::new(model),
            Arc::new(chats),
        ));

        let events: Vec<ChatStreamEvent> = orchestrator
            .stream_message(request("snack ideas?"))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ChatStreamEvent::Error { .. }));
    }

    #[tokio::test]
    async fn test_dropping_stream_skips_persistence() {
        let mut chats = MockChatHistoryRepository::new();
        chats.expect_create_chat_history().never();

        let model = ScriptedChatModel {
            script: vec![Ok("partial".to_string())],
            hang_after_script: true,
        };
        let orchestrator = Arc::new(ChatOrchestrator::new(
            assembler(owning_children(), MockRecordRepository::new()),
            Arc::new(model),
            Arc::new(chats),
        ));

        let mut events = orchestrator.stream_message(request("snack ideas?"));
        assert!(matches!(events.next().await, Some(ChatStreamEvent::Content { .. })));
        drop(events);
    }

    #[tokio::test]
    async fn test_deadline_ends_stalled_stream_with_error() {
        let mut chats = MockChatHistoryRepository::new();
        chats.expect_create_chat_history().never();

        let model = ScriptedChatModel {
            script: vec![Ok("partial".to_string())],
            hang_after_script: true,
        };
        let orchestrator = Arc::new(
            ChatOrchestrator::new(
                assembler(owning_children(), MockRecordRepository::new()),
                Arc::new(model),
                Arc::new(chats),
            )
            .with_deadline(Some(Duration::from_millis(50))),
        );

        let events: Vec<ChatStreamEvent> = orchestrator
            .stream_message(request("snack ideas?"))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ChatStreamEvent::Error {
                error: ChatError::DeadlineExceeded.to_string()
            }
        );
    }

    /// Records which events fire while a span named `chat` is entered.
    #[derive(Default)]
    struct SpanRecorder {
        next_id: AtomicU64,
        names: Mutex<HashMap<u64, &'static str>>,
        entered: Mutex<Vec<u64>>,
        inside_chat: AtomicUsize,
        outside_chat: AtomicUsize,
    }

    impl SpanRecorder {
        fn chat_entered(&self) -> bool {
            let names = self.names.lock().unwrap();
            self.entered
                .lock()
                .unwrap()
                .iter()
                .any(|id| names.get(id) == Some(&"chat"))
        }
    }

    impl Subscriber for SpanRecorder {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, attributes: &Attributes<'_>) -> Id {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.names
                .lock()
                .unwrap()
                .insert(id, attributes.metadata().name());
            Id::from_u64(id)
        }

        fn record(&self, _span: &Id, _values: &Record<'_>) {}

        fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

        fn event(&self, _event: &Event<'_>) {
            if self.chat_entered() {
                self.inside_chat.fetch_add(1, Ordering::SeqCst);
            } else {
                self.outside_chat.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn enter(&self, span: &Id) {
            self.entered.lock().unwrap().push(span.into_u64());
        }

        fn exit(&self, span: &Id) {
            let mut entered = self.entered.lock().unwrap();
            if let Some(position) = entered.iter().rposition(|id| *id == span.into_u64()) {
                entered.remove(position);
            }
        }
    }

    #[tokio::test]
    async fn test_stream_logs_under_chat_span() {
        let recorder = Arc::new(SpanRecorder::default());
        let _default = tracing::subscriber::set_default(recorder.clone());

        let saved = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            assembler(owning_children(), MockRecordRepository::new()),
            Arc::new(ScriptedChatModel::tokens(&["Try ", "rice."])),
            Arc::new(capturing_repository(saved)),
        ));

        let events: Vec<ChatStreamEvent> = orchestrator
            .stream_message(request("snack ideas?"))
            .collect()
            .await;

        assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));
        assert!(recorder.names.lock().unwrap().values().any(|name| *name == "chat"));
        assert!(recorder.inside_chat.load(Ordering::SeqCst) > 0);
        assert_eq!(recorder.outside_chat.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_message_returns_filtered_reply() {
        let saved = Arc::new(Mutex::new(Vec::new()));
        let orchestrator = ChatOrchestrator::new(
            assembler(owning_children(), MockRecordRepository::new()),
            Arc::new(ScriptedChatModel::tokens(&["If the fever persists, ", "give your baby fluids."])),
            Arc::new(capturing_repository(saved.clone())),
        );

        let reply = orchestrator.send_message(request("fever?")).await.unwrap();

        assert_eq!(reply.chat_id, 42);
        assert_eq!(reply.safety_flags, vec!["medical_advice".to_string()]);
        assert!(reply.response.contains("professional medical advice"));
        assert!(reply.context_summary.contains(&"Vector search matches: 0".to_string()));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let orchestrator = ChatOrchestrator::new(
            assembler(MockChildRepository::new(), MockRecordRepository::new()),
            Arc::new(ScriptedChatModel::tokens(&["unused"])),
            Arc::new(MockChatHistoryRepository::new()),
        );

        assert!(matches!(
            orchestrator.send_message(request("  ")).await,
            Err(ChatError::InvalidInput(_))
        ));
    }
}
