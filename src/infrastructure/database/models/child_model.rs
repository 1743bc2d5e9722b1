use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::domain::entities::Child;
use crate::infrastructure::database::schema::children;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = children)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChildModel {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Option<String>,
    pub allergy_info: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ChildModel> for Child {
    fn from(model: ChildModel) -> Self {
        Child {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            birth_date: model.birth_date,
            gender: model.gender,
            allergy_info: model
                .allergy_info
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            notes: model.notes,
        }
    }
}
