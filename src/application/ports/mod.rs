pub mod chat_model;
pub mod embedder;
pub mod embedding_provider;
pub mod provider_error;

pub use chat_model::{ChatCompletion, ChatMessage, ChatModel, ChatRole, TokenStream};
pub use embedder::{Embedder, EmbeddingError};
pub use embedding_provider::EmbeddingProvider;
pub use provider_error::ProviderError;
