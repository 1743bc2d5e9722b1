use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::{ChatHistory, NewChatHistory};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatHistoryRepository: Send + Sync {
    async fn find_one(&self, chat_id: i64) -> Result<Option<ChatHistory>, RepositoryError>;

    /// Most recent exchanges of a user, newest first, optionally scoped to a child.
    async fn get_chat_history(
        &self,
        user_id: i64,
        child_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatHistory>, RepositoryError>;

    async fn get_user_chats(
        &self,
        user_id: i64,
        child_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatHistory>, RepositoryError>;

    async fn create_chat_history(
        &self,
        chat: NewChatHistory,
    ) -> Result<ChatHistory, RepositoryError>;

    /// Sets the feedback score; fails with `Forbidden` for another user's chat.
    async fn save_feedback(
        &self,
        chat_id: i64,
        user_id: i64,
        feedback: i32,
    ) -> Result<ChatHistory, RepositoryError>;
}
