pub mod chat_history_repository;
pub mod child_repository;
pub mod record_repository;
pub mod vector_store;

pub use chat_history_repository::ChatHistoryRepository;
pub use child_repository::ChildRepository;
pub use record_repository::RecordRepository;
pub use vector_store::{VectorStore, VectorStoreError};

/// Failure raised by the collaborators that own children, records and chats.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}
