pub mod chat_history_model;
pub mod child_model;
pub mod daily_record_model;
pub mod text_chunk_model;

pub use chat_history_model::*;
pub use child_model::*;
pub use daily_record_model::*;
pub use text_chunk_model::*;
