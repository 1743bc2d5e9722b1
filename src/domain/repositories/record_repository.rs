use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::DailyRecord;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn find_one(&self, record_id: i64) -> Result<Option<DailyRecord>, RepositoryError>;
    /// All records of a child, most recent first.
    async fn find_all_by_child(&self, child_id: i64) -> Result<Vec<DailyRecord>, RepositoryError>;
}
