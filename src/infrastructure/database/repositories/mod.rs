pub mod postgres_chat_history_repository;
pub mod postgres_child_repository;
pub mod postgres_record_repository;
pub mod postgres_vector_store;

pub use postgres_chat_history_repository::PostgresChatHistoryRepository;
pub use postgres_child_repository::PostgresChildRepository;
pub use postgres_record_repository::PostgresRecordRepository;
pub use postgres_vector_store::PostgresVectorStore;
