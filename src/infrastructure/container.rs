use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    application::{
        ports::{ChatModel, Embedder, EmbeddingProvider},
        services::{
            AssemblerSettings, ChatOrchestrator, ChunkIndexer, ContextAssembler, EmbeddingService,
            RetryPolicy,
        },
        use_cases::{
            IndexSourceUseCase, ListChatHistoryUseCase, SaveFeedbackUseCase, SearchChunksUseCase,
        },
    },
    domain::repositories::{ChatHistoryRepository, ChildRepository, RecordRepository, VectorStore},
    infrastructure::{
        config::{AppConfig, EmbeddingConfig, EmbeddingProviderKind, VectorStoreKind},
        database::{
            create_connection_pool,
            repositories::{
                PostgresChatHistoryRepository, PostgresChildRepository, PostgresRecordRepository,
                PostgresVectorStore,
            },
            run_migrations,
        },
        external_services::{OllamaEmbeddingProvider, OpenAiChatModel, OpenAiEmbeddingProvider},
        messaging::RetentionSweeper,
        vector::InMemoryVectorStore,
    },
    presentation::http::handlers::{ChatHandler, HealthHandler, IndexHandler, SearchHandler},
};

pub struct AppContainer {
    // Background work
    pub retention_sweeper: Option<Arc<RetentionSweeper>>,

    // HTTP Handlers
    pub health_handler: Arc<HealthHandler>,
    pub chat_handler: Arc<ChatHandler>,
    pub search_handler: Arc<SearchHandler>,
    pub index_handler: Arc<IndexHandler>,
}

impl AppContainer {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        // Children, records and chats always live in Postgres.
        let db_pool = create_connection_pool(&config.database)
            .map_err(|e| format!("Failed to create database pool: {}", e))?;
        run_migrations(&db_pool).map_err(|e| format!("Failed to run database migrations: {}", e))?;

        let child_repository: Arc<dyn ChildRepository> =
            Arc::new(PostgresChildRepository::new(db_pool.clone()));
        let record_repository: Arc<dyn RecordRepository> =
            Arc::new(PostgresRecordRepository::new(db_pool.clone()));
        let chat_repository: Arc<dyn ChatHistoryRepository> =
            Arc::new(PostgresChatHistoryRepository::new(db_pool.clone()));

        // Create external services
        let embedding_service = Arc::new(build_embedding_service(&config.embedding)?);
        let embedder: Arc<dyn Embedder> = embedding_service.clone();
        let chat_model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(&config.chat_model)?);

        let retrieval = &config.retrieval;
        let (vector_store, vector_backend): (Arc<dyn VectorStore>, &'static str) =
            match retrieval.vector_store {
                VectorStoreKind::Postgres => (
                    Arc::new(PostgresVectorStore::new(db_pool.clone(), embedder)),
                    "postgres",
                ),
                VectorStoreKind::Memory => {
                    warn!("Using in-memory vector store, chunks are lost on restart");
                    (Arc::new(InMemoryVectorStore::new(embedder)), "memory")
                }
            };

        // Create application services
        let assembler = Arc::new(ContextAssembler::new(
            child_repository.clone(),
            record_repository.clone(),
            chat_repository.clone(),
            vector_store.clone(),
            AssemblerSettings {
                search_limit: retrieval.search_limit,
                similarity_threshold: retrieval.similarity_threshold,
                hydration_concurrency: retrieval.hydration_concurrency,
                fallback_chat_limit: retrieval.fallback_chat_limit,
                overview_chat_limit: retrieval.overview_chat_limit,
            },
        ));

        let chunk_indexer = Arc::new(ChunkIndexer::new(
            child_repository.clone(),
            record_repository.clone(),
            vector_store.clone(),
            retrieval.chunk_size_words,
            retrieval.chunk_overlap_words,
        ));

        let orchestrator = Arc::new(
            ChatOrchestrator::new(assembler, chat_model.clone(), chat_repository.clone())
                .with_indexer(chunk_indexer.clone())
                .with_deadline(retrieval.request_deadline_secs.map(Duration::from_secs)),
        );

        let retention_sweeper = retrieval.retention_days.map(|days| {
            Arc::new(
                RetentionSweeper::new(chunk_indexer.clone(), days)
                    .with_interval(Duration::from_secs(retrieval.retention_interval_secs)),
            )
        });

        // Create use cases
        let search_use_case = Arc::new(SearchChunksUseCase::new(
            vector_store.clone(),
            child_repository.clone(),
            retrieval.search_limit,
            retrieval.similarity_threshold,
        ));
        let index_use_case = Arc::new(IndexSourceUseCase::new(
            chunk_indexer,
            child_repository,
            record_repository,
        ));
        let list_history_use_case = Arc::new(ListChatHistoryUseCase::new(chat_repository.clone()));
        let save_feedback_use_case = Arc::new(SaveFeedbackUseCase::new(chat_repository));

        // Create HTTP handlers
        let health_handler = Arc::new(HealthHandler::new(
            vector_store,
            vector_backend,
            Some(db_pool),
        ));
        let chat_handler = Arc::new(ChatHandler::new(
            orchestrator,
            list_history_use_case,
            save_feedback_use_case,
        ));
        let search_handler = Arc::new(SearchHandler::new(search_use_case));
        let index_handler = Arc::new(IndexHandler::new(index_use_case));

        info!(
            embedding_model = embedding_service.model_name(),
            chat_model = chat_model.model_name(),
            vector_store = ?retrieval.vector_store,
            "Application container ready"
        );

        Ok(Self {
            retention_sweeper,
            health_handler,
            chat_handler,
            search_handler,
            index_handler,
        })
    }
}

fn build_embedding_service(
    config: &EmbeddingConfig,
) -> Result<EmbeddingService, Box<dyn std::error::Error>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbeddingProvider::new(config)?),
        EmbeddingProviderKind::Ollama => Arc::new(OllamaEmbeddingProvider::new(config)?),
    };

    let retry_policy = RetryPolicy {
        max_retries: config.max_retries,
        initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        max_backoff: Duration::from_millis(config.max_backoff_ms),
        ..RetryPolicy::default()
    };

    Ok(EmbeddingService::new(provider, config.dimension)
        .with_retry_policy(retry_policy)
        .with_batch_size(config.batch_size)
        .with_strict_dimensions(config.strict_dimensions))
}
