#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicalCheckResult {
    pub contains_medical_advice: bool,
    pub medical_terms: Vec<String>,
}

/// Directive phrasing that on its own marks an answer as medical advice.
const STRONG_INDICATORS: &[&str] = &[
    "you should give",
    "you should take",
    "give your baby",
    "give your child",
    "administer",
    "the recommended dose",
    "the correct dose",
    "dosage of",
    "mg of",
    "ml of medicine",
    "i recommend medication",
    "start treatment",
    "stop the medication",
    "prescribe",
    "diagnosed with",
    "you need antibiotics",
];

const MEDICAL_KEYWORDS: &[&str] = &[
    "fever",
    "temperature",
    "medication",
    "medicine",
    "antibiotic",
    "dose",
    "dosage",
    "diagnosis",
    "infection",
    "prescription",
    "symptom",
    "ibuprofen",
    "acetaminophen",
    "paracetamol",
    "tylenol",
    "motrin",
    "vaccine",
    "vaccination",
    "rash",
    "vomiting",
    "diarrhea",
    "dehydration",
    "allergic reaction",
    "anaphylaxis",
    "asthma",
    "eczema",
    "inhaler",
    "seizure",
    "ear infection",
    "croup",
    "bronchiolitis",
    "jaundice",
    "reflux",
    "colic",
    "constipation",
    "cough syrup",
    "steroid",
    "cream for",
    "emergency room",
    "urgent care",
];

const KEYWORD_THRESHOLD: usize = 2;

pub const MEDICAL_DISCLAIMER: &str = "\n\n---\nThis information is general guidance and not a substitute for professional medical advice. Please consult your pediatrician or a qualified healthcare provider about your child's health.";

#[derive(Debug, Default)]
pub struct MedicalChecker;

impl MedicalChecker {
    pub fn new() -> Self {
        Self
    }

    /// Any strong indicator classifies immediately; otherwise two or more
    /// distinct keywords are required.
    pub fn check(&self, response_text: &str) -> MedicalCheckResult {
        let haystack = response_text.to_lowercase();

        let indicators: Vec<String> = STRONG_INDICATORS
            .iter()
            .filter(|phrase| haystack.contains(*phrase))
            .map(|phrase| phrase.to_string())
            .collect();

        let keywords: Vec<String> = MEDICAL_KEYWORDS
            .iter()
            .filter(|term| haystack.contains(*term))
            .map(|term| term.to_string())
            .collect();

        let contains_medical_advice = !indicators.is_empty() || keywords.len() >= KEYWORD_THRESHOLD;

        let mut medical_terms = indicators;
        medical_terms.extend(keywords);

        MedicalCheckResult {
            contains_medical_advice,
            medical_terms,
        }
    }

    pub fn add_disclaimer(&self, text: &str) -> String {
        format!("{}{}", text, MEDICAL_DISCLAIMER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_strong_indicator_is_enough() {
        let result = MedicalChecker::new().check("You should give a small amount at bedtime.");
        assert!(result.contains_medical_advice);
        assert!(result.medical_terms.contains(&"you should give".to_string()));
    }

    #[test]
    fn test_keyword_threshold() {
        let checker = MedicalChecker::new();

        let one = checker.check("A mild rash after teething is common.");
        assert!(!one.contains_medical_advice);
        assert_eq!(one.medical_terms, vec!["rash".to_string()]);

        let two = checker.check("A fever with a rash deserves attention.");
        assert!(two.contains_medical_advice);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        let result = MedicalChecker::new().check("Fever, fever, and more fever.");
        assert!(!result.contains_medical_advice);
    }

    #[test]
    fn test_plain_parenting_text() {
        let result = MedicalChecker::new().check("Reading together before naps builds routine.");
        assert!(!result.contains_medical_advice);
        assert!(result.medical_terms.is_empty());
    }

    #[test]
    fn test_add_disclaimer_appends_suffix() {
        let text = MedicalChecker::new().add_disclaimer("Keep them hydrated.");
        assert!(text.starts_with("Keep them hydrated."));
        assert!(text.ends_with(MEDICAL_DISCLAIMER));
    }
}
