use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logged care event for a child (feeding, sleep, diaper, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub id: i64,
    pub child_id: i64,
    pub record_type: String,
    pub note: Option<String>,
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DailyRecord {
    /// Single-line human readable form used for prompts and indexing.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!(
            "{} at {}",
            self.record_type,
            self.recorded_at.format("%Y-%m-%d %H:%M")
        )];

        if let serde_json::Value::Object(map) = &self.details {
            let details: Vec<String> = map
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| match value {
                    serde_json::Value::String(s) => format!("{}: {}", key, s),
                    other => format!("{}: {}", key, other),
                })
                .collect();
            if !details.is_empty() {
                parts.push(details.join(", "));
            }
        }

        if let Some(note) = self.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            parts.push(format!("note: {}", note));
        }

        parts.join(" - ")
    }
}
