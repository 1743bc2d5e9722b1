pub mod chat_history;
pub mod child;
pub mod context;
pub mod daily_record;
pub mod text_chunk;

pub use chat_history::{ChatHistory, NewChatHistory};
pub use child::{Child, ChildListItem, ChildSummary};
pub use context::{Context, RelevantChat, RelevantRecord, VectorSearchHit};
pub use daily_record::DailyRecord;
pub use text_chunk::{NewTextChunk, ScoredChunk, TextChunk};
