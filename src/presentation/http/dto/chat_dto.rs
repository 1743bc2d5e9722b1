use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::services::ChatReply;
use crate::domain::entities::ChatHistory;
use crate::domain::value_objects::SafetyFlag;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestDto {
    pub message: String,
    pub child_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseDto {
    pub chat_id: i64,
    pub response: String,
    pub safety_flags: Vec<String>,
    pub context_summary: Vec<String>,
}

impl From<ChatReply> for ChatResponseDto {
    fn from(reply: ChatReply) -> Self {
        Self {
            chat_id: reply.chat_id,
            response: reply.response,
            safety_flags: reply.safety_flags,
            context_summary: reply.context_summary,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryQueryDto {
    pub child_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryDto {
    pub id: i64,
    pub child_id: Option<i64>,
    pub user_message: String,
    pub ai_response: String,
    pub safety_flags: Vec<String>,
    pub feedback: Option<i32>,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
}

impl From<ChatHistory> for ChatHistoryDto {
    fn from(chat: ChatHistory) -> Self {
        Self {
            id: chat.id,
            child_id: chat.child_id,
            user_message: chat.user_message,
            ai_response: chat.ai_response,
            safety_flags: SafetyFlag::split(&chat.safety_flags),
            feedback: chat.feedback,
            request_timestamp: chat.request_timestamp,
            response_timestamp: chat.response_timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequestDto {
    pub feedback: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_dto_splits_flags() {
        let now = Utc::now();
        let dto = ChatHistoryDto::from(ChatHistory {
            id: 1,
            user_id: 2,
            child_id: Some(3),
            user_message: "Can she eat cheese?".to_string(),
            ai_response: "Not with a milk allergy.".to_string(),
            raw_ai_response: "Not with a milk allergy.".to_string(),
            context_summary: vec![],
            safety_flags: "allergy:Milk(cheese),medical_advice".to_string(),
            feedback: None,
            request_timestamp: now,
            response_timestamp: now,
        });

        assert_eq!(dto.safety_flags, vec!["allergy:Milk(cheese)", "medical_advice"]);
    }

    #[test]
    fn test_chat_request_reads_camel_case() {
        let dto: ChatRequestDto =
            serde_json::from_str(r#"{"message": "hi", "childId": 4}"#).unwrap();
        assert_eq!(dto.child_id, Some(4));
    }
}
