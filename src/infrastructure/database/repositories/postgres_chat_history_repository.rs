use async_trait::async_trait;
use diesel::prelude::*;

use crate::domain::entities::{ChatHistory, NewChatHistory};
use crate::domain::repositories::{ChatHistoryRepository, RepositoryError};
use crate::infrastructure::database::models::{ChatHistoryModel, NewChatHistoryModel};
use crate::infrastructure::database::schema::chat_histories;
use crate::infrastructure::database::{DbPool, with_connection};

pub struct PostgresChatHistoryRepository {
    pool: DbPool,
}

impl PostgresChatHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn page(
        &self,
        user_id: i64,
        child_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatHistory>, RepositoryError> {
        let models = with_connection(&self.pool, move |conn| {
            let mut query = chat_histories::table
                .filter(chat_histories::user_id.eq(user_id))
                .into_boxed();

            if let Some(child_id) = child_id {
                query = query.filter(chat_histories::child_id.eq(child_id));
            }

            Ok(query
                .order((
                    chat_histories::request_timestamp.desc(),
                    chat_histories::id.desc(),
                ))
                .limit(limit)
                .offset(offset)
                .select(ChatHistoryModel::as_select())
                .load::<ChatHistoryModel>(conn)?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(models.into_iter().map(ChatHistory::from).collect())
    }
}

#[async_trait]
impl ChatHistoryRepository for PostgresChatHistoryRepository {
    async fn find_one(&self, chat_id: i64) -> Result<Option<ChatHistory>, RepositoryError> {
        let model = with_connection(&self.pool, move |conn| {
            Ok(chat_histories::table
                .find(chat_id)
                .select(ChatHistoryModel::as_select())
                .first::<ChatHistoryModel>(conn)
                .optional()?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(model.map(ChatHistory::from))
    }

    async fn get_chat_history(
        &self,
        user_id: i64,
        child_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatHistory>, RepositoryError> {
        self.page(user_id, child_id, limit, 0).await
    }

    async fn get_user_chats(
        &self,
        user_id: i64,
        child_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatHistory>, RepositoryError> {
        self.page(user_id, child_id, limit, offset).await
    }

    async fn create_chat_history(
        &self,
        chat: NewChatHistory,
    ) -> Result<ChatHistory, RepositoryError> {
        let new_chat = NewChatHistoryModel::from(chat);

        let model = with_connection(&self.pool, move |conn| {
            Ok(diesel::insert_into(chat_histories::table)
                .values(&new_chat)
                .returning(ChatHistoryModel::as_returning())
                .get_result::<ChatHistoryModel>(conn)?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(ChatHistory::from(model))
    }

    async fn save_feedback(
        &self,
        chat_id: i64,
        user_id: i64,
        feedback: i32,
    ) -> Result<ChatHistory, RepositoryError> {
        let existing = self
            .find_one(chat_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", chat_id)))?;

        if !existing.is_owned_by(user_id) {
            return Err(RepositoryError::Forbidden(format!(
                "chat {} does not belong to user {}",
                chat_id, user_id
            )));
        }

        let model = with_connection(&self.pool, move |conn| {
            Ok(diesel::update(chat_histories::table.find(chat_id))
                .set(chat_histories::feedback.eq(Some(feedback)))
                .returning(ChatHistoryModel::as_returning())
                .get_result::<ChatHistoryModel>(conn)?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(ChatHistory::from(model))
    }
}
