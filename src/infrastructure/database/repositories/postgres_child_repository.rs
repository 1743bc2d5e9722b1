use async_trait::async_trait;
use diesel::prelude::*;

use crate::domain::entities::Child;
use crate::domain::repositories::{ChildRepository, RepositoryError};
use crate::infrastructure::database::models::ChildModel;
use crate::infrastructure::database::schema::children;
use crate::infrastructure::database::{DbPool, with_connection};

pub struct PostgresChildRepository {
    pool: DbPool,
}

impl PostgresChildRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(&self, child_id: i64) -> Result<Option<Child>, RepositoryError> {
        with_connection(&self.pool, move |conn| {
            Ok(children::table
                .find(child_id)
                .select(ChildModel::as_select())
                .first::<ChildModel>(conn)
                .optional()?)
        })
        .await
        .map(|model| model.map(Child::from))
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }
}

#[async_trait]
impl ChildRepository for PostgresChildRepository {
    async fn find_one(&self, child_id: i64, user_id: i64) -> Result<Child, RepositoryError> {
        let child = self
            .load(child_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("child {}", child_id)))?;

        if child.user_id != user_id {
            return Err(RepositoryError::Forbidden(format!(
                "child {} does not belong to user {}",
                child_id, user_id
            )));
        }

        Ok(child)
    }

    async fn find_all(&self, user_id: i64) -> Result<Vec<Child>, RepositoryError> {
        let models = with_connection(&self.pool, move |conn| {
            Ok(children::table
                .filter(children::user_id.eq(user_id))
                .order(children::id.asc())
                .select(ChildModel::as_select())
                .load::<ChildModel>(conn)?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(models.into_iter().map(Child::from).collect())
    }

    async fn find_by_id(&self, child_id: i64) -> Result<Option<Child>, RepositoryError> {
        self.load(child_id).await
    }
}
