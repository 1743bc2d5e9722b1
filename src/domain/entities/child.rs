use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Child profile as owned by the external profile service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Option<String>,
    pub allergy_info: Vec<String>,
    pub notes: Option<String>,
}

impl Child {
    pub fn age_in_months(&self, today: NaiveDate) -> u32 {
        age_in_months(self.birth_date, today)
    }

    pub fn summary(&self, today: NaiveDate) -> ChildSummary {
        ChildSummary {
            id: self.id,
            name: self.name.clone(),
            age_in_months: self.age_in_months(today),
            gender: self.gender.clone(),
            allergy_info: self.allergy_info.clone(),
        }
    }

    pub fn list_item(&self, today: NaiveDate) -> ChildListItem {
        ChildListItem {
            id: self.id,
            name: self.name.clone(),
            age_in_months: self.age_in_months(today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSummary {
    pub id: i64,
    pub name: String,
    pub age_in_months: u32,
    pub gender: Option<String>,
    pub allergy_info: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildListItem {
    pub id: i64,
    pub name: String,
    pub age_in_months: u32,
}

/// Whole months elapsed between `birth` and `today`, never negative.
pub fn age_in_months(birth: NaiveDate, today: NaiveDate) -> u32 {
    let years = today.year() - birth.year();
    let months = today.month() as i32 - birth.month() as i32;
    let partial = if today.day() < birth.day() { 1 } else { 0 };

    (years * 12 + months - partial).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_counts_whole_months() {
        assert_eq!(age_in_months(date(2024, 1, 15), date(2024, 10, 15)), 9);
        assert_eq!(age_in_months(date(2024, 1, 15), date(2024, 10, 14)), 8);
        assert_eq!(age_in_months(date(2022, 11, 30), date(2024, 2, 1)), 14);
    }

    #[test]
    fn test_age_is_clamped_for_future_birth() {
        assert_eq!(age_in_months(date(2025, 3, 1), date(2024, 10, 1)), 0);
    }

    #[test]
    fn test_summary_carries_allergies() {
        let child = Child {
            id: 3,
            user_id: 1,
            name: "Mia".to_string(),
            birth_date: date(2023, 6, 1),
            gender: Some("female".to_string()),
            allergy_info: vec!["Milk".to_string()],
            notes: None,
        };

        let summary = child.summary(date(2024, 6, 1));
        assert_eq!(summary.age_in_months, 12);
        assert_eq!(summary.allergy_info, vec!["Milk"]);
        assert_eq!(child.list_item(date(2024, 6, 1)).age_in_months, 12);
    }
}
