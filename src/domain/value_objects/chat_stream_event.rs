use serde::{Deserialize, Serialize};

/// Event delivered to a streaming chat caller. Every stream ends with
/// exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
    Content {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        chat_id: i64,
        safety_flags: Vec<String>,
    },
    Error {
        error: String,
    },
}

impl ChatStreamEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatStreamEvent::Content { .. } => "content",
            ChatStreamEvent::Done { .. } => "done",
            ChatStreamEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChatStreamEvent::Content { .. })
    }
}
