use serde::{Deserialize, Serialize};
use std::fmt;

/// Annotation recorded on an answer that was altered by a safety filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyFlag {
    /// Allergen match as reported by the allergy checker, e.g. `Milk(cheese)`.
    Allergy(String),
    MedicalAdvice,
}

impl SafetyFlag {
    pub fn tag(&self) -> String {
        match self {
            SafetyFlag::Allergy(matched) => format!("allergy:{}", matched),
            SafetyFlag::MedicalAdvice => "medical_advice".to_string(),
        }
    }

    pub fn join(flags: &[SafetyFlag]) -> String {
        flags
            .iter()
            .map(SafetyFlag::tag)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn split(joined: &str) -> Vec<String> {
        joined
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for SafetyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}
