use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted question/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub id: i64,
    pub user_id: i64,
    pub child_id: Option<i64>,
    pub user_message: String,
    pub ai_response: String,
    pub raw_ai_response: String,
    pub context_summary: Vec<String>,
    pub safety_flags: String,
    pub feedback: Option<i32>,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
}

impl ChatHistory {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    pub fn was_flagged(&self) -> bool {
        !self.safety_flags.trim().is_empty()
    }

    /// Text that represents this exchange in the vector store.
    pub fn exchange_text(&self) -> String {
        format!("User: {}\nAssistant: {}", self.user_message, self.ai_response)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChatHistory {
    pub user_id: i64,
    pub child_id: Option<i64>,
    pub user_message: String,
    pub ai_response: String,
    pub raw_ai_response: String,
    pub context_summary: Vec<String>,
    pub safety_flags: String,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
}
