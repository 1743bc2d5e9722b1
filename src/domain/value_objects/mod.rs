pub mod chat_stream_event;
pub mod safety_flag;
pub mod search_filters;
pub mod source_type;

pub use chat_stream_event::ChatStreamEvent;
pub use safety_flag::SafetyFlag;
pub use search_filters::{MetadataFilter, MetadataMatch, SearchFilters};
pub use source_type::SourceType;
