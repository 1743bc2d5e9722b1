use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity a text chunk was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    ChildProfile,
    Record,
    ChatHistory,
}

impl SourceType {
    pub const ALL: [SourceType; 3] = [
        SourceType::ChildProfile,
        SourceType::Record,
        SourceType::ChatHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::ChildProfile => "child_profile",
            SourceType::Record => "record",
            SourceType::ChatHistory => "chat_history",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        SourceType::ALL
            .into_iter()
            .find(|source_type| source_type.as_str() == normalized)
            .ok_or_else(|| format!("Invalid source type: {}", normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_types() {
        for source_type in SourceType::ALL {
            assert_eq!(source_type.as_str().parse::<SourceType>(), Ok(source_type));
        }
        assert_eq!(" Record ".parse::<SourceType>(), Ok(SourceType::Record));
    }

    #[test]
    fn test_parse_unknown_type() {
        assert!("document".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&SourceType::ChildProfile).unwrap();
        assert_eq!(json, "\"child_profile\"");
    }
}
