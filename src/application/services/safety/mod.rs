//! Post-generation filters run once over a complete model answer.

pub mod allergy_checker;
pub mod medical_checker;

pub use allergy_checker::{AllergyCheckResult, AllergyChecker};
pub use medical_checker::{MEDICAL_DISCLAIMER, MedicalCheckResult, MedicalChecker};

use crate::domain::entities::ChildSummary;
use crate::domain::value_objects::SafetyFlag;

/// Final answer text plus the flags explaining how it was altered.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredResponse {
    pub text: String,
    pub flags: Vec<SafetyFlag>,
}

#[derive(Debug, Default)]
pub struct SafetyFilter {
    allergy: AllergyChecker,
    medical: MedicalChecker,
}

impl SafetyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suffixes are appended in order: allergy warning, medical disclaimer,
    /// age guidance. The raw text is never rewritten in place.
    pub fn apply(&self, raw: &str, child: Option<&ChildSummary>) -> FilteredResponse {
        let mut text = raw.to_string();
        let mut flags = Vec::new();

        if let Some(child) = child {
            let allergy = self.allergy.check(raw, &child.allergy_info);
            if allergy.has_potential_allergy {
                text.push_str(&allergy_warning(&child.name, &allergy.allergens));
                flags.extend(allergy.allergens.into_iter().map(SafetyFlag::Allergy));
            }
        }

        let medical = self.medical.check(raw);
        if medical.contains_medical_advice {
            text = self.medical.add_disclaimer(&text);
            flags.push(SafetyFlag::MedicalAdvice);
        }

        if let Some(child) = child {
            text.push_str(&age_guidance(child));
        }

        FilteredResponse { text, flags }
    }
}

fn allergy_warning(name: &str, matched: &[String]) -> String {
    format!(
        "\n\n⚠️ Allergy warning: this answer mentions {} which may conflict with {}'s recorded allergies. Please check ingredients carefully before offering any food.",
        matched.join(", "),
        name
    )
}

fn age_guidance(child: &ChildSummary) -> String {
    format!(
        "\n\nThis guidance is tailored for {} at {} months. Every child develops at their own pace, so adapt it to what you observe.",
        child.name, child.age_in_months
    )
}
