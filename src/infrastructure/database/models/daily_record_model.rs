use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::DailyRecord;
use crate::infrastructure::database::schema::daily_records;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = daily_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DailyRecordModel {
    pub id: i64,
    pub child_id: i64,
    pub record_type: String,
    pub note: Option<String>,
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<DailyRecordModel> for DailyRecord {
    fn from(model: DailyRecordModel) -> Self {
        DailyRecord {
            id: model.id,
            child_id: model.child_id,
            record_type: model.record_type,
            note: model.note,
            details: model.details,
            recorded_at: model.recorded_at,
            created_at: model.created_at,
        }
    }
}
