use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SourceType;

/// Expected value for a single metadata key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataMatch {
    Bool(bool),
    Number(f64),
    Text(String),
    OneOf(Vec<Value>),
}

impl MetadataMatch {
    /// Scalar JSON form used for typed equality (`@>` containment on Postgres).
    pub fn as_json(&self) -> Option<Value> {
        match self {
            MetadataMatch::Bool(b) => Some(Value::Bool(*b)),
            MetadataMatch::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number),
            MetadataMatch::Text(s) => Some(Value::String(s.clone())),
            MetadataMatch::OneOf(_) => None,
        }
    }

    /// Text forms of the list members, matching what `->>` yields on Postgres.
    pub fn candidate_texts(&self) -> Vec<String> {
        match self {
            MetadataMatch::OneOf(values) => values.iter().filter_map(scalar_text).collect(),
            _ => Vec::new(),
        }
    }

    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return false;
        };

        match self {
            MetadataMatch::Bool(expected) => actual.as_bool() == Some(*expected),
            MetadataMatch::Number(expected) => actual.as_f64() == Some(*expected),
            MetadataMatch::Text(expected) => actual.as_str() == Some(expected.as_str()),
            MetadataMatch::OneOf(_) => match scalar_text(actual) {
                Some(text) => self.candidate_texts().contains(&text),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub key: String,
    pub value: MetadataMatch,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, value: MetadataMatch) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Optional narrowing applied on top of the child scope of a vector search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub source_types: Option<Vec<SourceType>>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Vec<MetadataFilter>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.source_types.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.metadata.is_empty()
    }

    pub fn with_source_types(mut self, source_types: Vec<SourceType>) -> Self {
        self.source_types = Some(source_types);
        self
    }

    pub fn with_date_range(
        mut self,
        created_after: Option<DateTime<Utc>>,
        created_before: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_after = created_after;
        self.created_before = created_before;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataMatch) -> Self {
        self.metadata.push(MetadataFilter::new(key, value));
        self
    }

    pub fn accepts(
        &self,
        source_type: SourceType,
        created_at: DateTime<Utc>,
        metadata: &Value,
    ) -> bool {
        if let Some(types) = &self.source_types {
            if !types.contains(&source_type) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if created_at > before {
                return false;
            }
        }

        self.metadata
            .iter()
            .all(|filter| filter.value.matches(metadata.get(&filter.key)))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
