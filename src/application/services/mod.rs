pub mod chat_orchestrator;
pub mod chunk_indexer;
pub mod context_assembler;
pub mod embedding_service;
pub mod prompt_formatter;
pub mod safety;
pub mod vector_math;

pub use chat_orchestrator::{ChatError, ChatOrchestrator, ChatReply, ChatRequest};
pub use chunk_indexer::{ChunkIndexer, IndexingError};
pub use context_assembler::{AssemblerSettings, ContextAssembler};
pub use embedding_service::{EmbeddingService, RetryPolicy};
pub use safety::{FilteredResponse, SafetyFilter};
