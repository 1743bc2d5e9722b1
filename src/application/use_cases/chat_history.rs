use std::sync::Arc;

use crate::domain::entities::ChatHistory;
use crate::domain::repositories::{ChatHistoryRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum ChatHistoryError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Repository error: {0}")]
    RepositoryError(String),
}

impl From<RepositoryError> for ChatHistoryError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(m) => ChatHistoryError::NotFound(m),
            RepositoryError::Forbidden(m) => ChatHistoryError::Forbidden(m),
            RepositoryError::DatabaseError(m) => ChatHistoryError::RepositoryError(m),
        }
    }
}

/// Accepted feedback scores: thumbs down, neutral, thumbs up.
pub const FEEDBACK_RANGE: std::ops::RangeInclusive<i32> = -1..=1;

#[derive(Debug, Clone)]
pub struct ListChatHistoryRequest {
    pub user_id: i64,
    pub child_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub struct ListChatHistoryUseCase {
    chat_repository: Arc<dyn ChatHistoryRepository>,
}

impl ListChatHistoryUseCase {
    pub fn new(chat_repository: Arc<dyn ChatHistoryRepository>) -> Self {
        Self { chat_repository }
    }

    pub async fn execute(
        &self,
        request: ListChatHistoryRequest,
    ) -> Result<Vec<ChatHistory>, ChatHistoryError> {
        // Validate input
        let limit = request.limit.unwrap_or(20);
        if !(1..=100).contains(&limit) {
            return Err(ChatHistoryError::ValidationError(
                "Limit must be between 1 and 100".to_string(),
            ));
        }
        let offset = request.offset.unwrap_or(0);
        if offset < 0 {
            return Err(ChatHistoryError::ValidationError(
                "Offset cannot be negative".to_string(),
            ));
        }

        // Newest first, scoped to the caller
        Ok(self
            .chat_repository
            .get_user_chats(request.user_id, request.child_id, limit, offset)
            .await?)
    }
}

pub struct SaveFeedbackUseCase {
    chat_repository: Arc<dyn ChatHistoryRepository>,
}

impl SaveFeedbackUseCase {
    pub fn new(chat_repository: Arc<dyn ChatHistoryRepository>) -> Self {
        Self { chat_repository }
    }

    pub async fn execute(
        &self,
        chat_id: i64,
        user_id: i64,
        feedback: i32,
    ) -> Result<ChatHistory, ChatHistoryError> {
        if !FEEDBACK_RANGE.contains(&feedback) {
            return Err(ChatHistoryError::ValidationError(format!(
                "Feedback must be between {} and {}",
                FEEDBACK_RANGE.start(),
                FEEDBACK_RANGE.end()
            )));
        }

        // The repository rejects chats owned by someone else
        Ok(self
            .chat_repository
            .save_feedback(chat_id, user_id, feedback)
            .await?)
    }
}
