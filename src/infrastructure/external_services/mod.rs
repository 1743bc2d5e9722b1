pub mod ollama_embedding_provider;
pub mod openai_chat_model;
pub mod openai_embedding_provider;

pub use ollama_embedding_provider::OllamaEmbeddingProvider;
pub use openai_chat_model::OpenAiChatModel;
pub use openai_embedding_provider::OpenAiEmbeddingProvider;
