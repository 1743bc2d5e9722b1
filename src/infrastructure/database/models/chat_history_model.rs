use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::{ChatHistory, NewChatHistory};
use crate::infrastructure::database::schema::chat_histories;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = chat_histories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatHistoryModel {
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

#[derive(Debug, Insertable)]
#[diesel(table_name = chat_histories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewChatHistoryModel {
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

impl From<NewChatHistory> for NewChatHistoryModel {
    fn from(chat: NewChatHistory) -> Self {
        Self {
            user_id: chat.user_id,
            child_id: chat.child_id,
            user_message: chat.user_message,
            ai_response: chat.ai_response,
            raw_ai_response: chat.raw_ai_response,
            context_summary: chat.context_summary,
            safety_flags: chat.safety_flags,
            request_timestamp: chat.request_timestamp,
            response_timestamp: chat.response_timestamp,
        }
    }
}

impl From<ChatHistoryModel> for ChatHistory {
    fn from(model: ChatHistoryModel) -> Self {
        ChatHistory {
            id: model.id,
            user_id: model.user_id,
            child_id: model.child_id,
            user_message: model.user_message,
            ai_response: model.ai_response,
            raw_ai_response: model.raw_ai_response,
            context_summary: model.context_summary,
            safety_flags: model.safety_flags,
            feedback: model.feedback,
            request_timestamp: model.request_timestamp,
            response_timestamp: model.response_timestamp,
        }
    }
}
