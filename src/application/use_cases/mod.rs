pub mod chat_history;
pub mod index_source;
pub mod search_chunks;

pub use chat_history::{
    ChatHistoryError, ListChatHistoryRequest, ListChatHistoryUseCase, SaveFeedbackUseCase,
};
pub use index_source::{IndexSourceError, IndexSourceResponse, IndexSourceUseCase};
pub use search_chunks::{
    SearchChunksError, SearchChunksRequest, SearchChunksResponse, SearchChunksUseCase,
};
