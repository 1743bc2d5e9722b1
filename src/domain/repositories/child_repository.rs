use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::Child;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChildRepository: Send + Sync {
    /// Loads a child and checks that `user_id` owns it.
    async fn find_one(&self, child_id: i64, user_id: i64) -> Result<Child, RepositoryError>;
    async fn find_all(&self, user_id: i64) -> Result<Vec<Child>, RepositoryError>;
    /// Loads a child without an ownership check, for background indexing.
    async fn find_by_id(&self, child_id: i64) -> Result<Option<Child>, RepositoryError>;
}
