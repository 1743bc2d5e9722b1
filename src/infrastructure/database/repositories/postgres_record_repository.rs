use async_trait::async_trait;
use diesel::prelude::*;

use crate::domain::entities::DailyRecord;
use crate::domain::repositories::{RecordRepository, RepositoryError};
use crate::infrastructure::database::models::DailyRecordModel;
use crate::infrastructure::database::schema::daily_records;
use crate::infrastructure::database::{DbPool, with_connection};

pub struct PostgresRecordRepository {
    pool: DbPool,
}

impl PostgresRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository for PostgresRecordRepository {
    async fn find_one(&self, record_id: i64) -> Result<Option<DailyRecord>, RepositoryError> {
        let model = with_connection(&self.pool, move |conn| {
            Ok(daily_records::table
                .find(record_id)
                .select(DailyRecordModel::as_select())
                .first::<DailyRecordModel>(conn)
                .optional()?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(model.map(DailyRecord::from))
    }

    async fn find_all_by_child(&self, child_id: i64) -> Result<Vec<DailyRecord>, RepositoryError> {
        let models = with_connection(&self.pool, move |conn| {
            Ok(daily_records::table
                .filter(daily_records::child_id.eq(child_id))
                .order((daily_records::recorded_at.desc(), daily_records::id.desc()))
                .select(DailyRecordModel::as_select())
                .load::<DailyRecordModel>(conn)?)
        })
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(models.into_iter().map(DailyRecord::from).collect())
    }
}
