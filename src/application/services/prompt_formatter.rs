//! Deterministic rendering of a [`Context`] into the system prompt.
//!
//! Rendering is a pure function of the context: no clocks, no randomness and
//! no hash-ordered iteration, so equal contexts always produce equal text.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::domain::entities::{ChatHistory, ChildSummary, Context, DailyRecord};

const PERSONA: &str = "You are Nestling, a warm, knowledgeable parenting assistant. \
Answer the parent's question using the child information and history below. \
Be practical and reassuring, and say so plainly when something needs a professional.";

const MAX_VECTOR_SNIPPETS: usize = 5;
const MAX_RECORDS_PER_TYPE: usize = 5;
const MAX_CONVERSATIONS: usize = 3;

/// Upper bound (inclusive, in months) and developmental blurb per bucket.
const AGE_BUCKETS: &[(u32, &str)] = &[
    (1, "Newborn stage: feeding on demand, lots of sleep, and skin-to-skin bonding matter most."),
    (3, "Early infancy: social smiles, tracking faces, and first attempts at head control."),
    (6, "Young infant: rolling, reaching and grasping; many babies get ready for first solids near six months."),
    (9, "Older infant: sitting unassisted, babbling, and exploring new food textures."),
    (12, "Pre-toddler: crawling, pulling to stand, first words, and growing separation awareness."),
    (18, "Early toddler: first steps, simple words, and strong curiosity about everything within reach."),
    (24, "Toddler: walking confidently, vocabulary growth, and testing independence."),
    (36, "Older toddler: short sentences, pretend play, and big feelings that need help with regulation."),
    (48, "Preschooler: imaginative play, lots of questions, and early social skills."),
    (60, "Older preschooler: longer conversations, early literacy interest, and friendships."),
];

const OLDER_CHILD_BLURB: &str =
    "School-age child: growing independence, structured learning, and more complex emotions.";

const GUIDELINES: &[&str] = &[
    "Tailor every suggestion to the child's age and developmental stage.",
    "Never recommend foods or products that contain the child's listed allergens.",
    "Ground your answer in the records and past conversations above when they are relevant.",
    "Do not diagnose conditions or prescribe medication or dosages.",
    "Recommend contacting a pediatrician for persistent, worsening or worrying symptoms.",
    "Tell the parent to seek emergency care immediately for signs of a medical emergency.",
    "Keep the answer concise and organised, using short lists for steps.",
    "Use warm, non-judgemental language that supports the parent's confidence.",
    "Say clearly when you are unsure instead of guessing.",
    "Respect that families differ and offer options rather than a single rule.",
];

/// Bucket whose inclusive upper bound covers `age_in_months`, `None` past the last one.
fn age_bucket(age_in_months: u32) -> Option<&'static (u32, &'static str)> {
    AGE_BUCKETS
        .iter()
        .find(|(bound, _)| age_in_months <= *bound)
}

pub fn developmental_blurb(age_in_months: u32) -> &'static str {
    age_bucket(age_in_months)
        .map(|(_, blurb)| *blurb)
        .unwrap_or(OLDER_CHILD_BLURB)
}

pub fn format_context_to_prompt(context: &Context) -> String {
    let mut prompt = String::from(PERSONA);

    if let Some(child) = &context.child {
        render_child(&mut prompt, child);
    }

    if let Some(children) = &context.available_children {
        if !children.is_empty() {
            prompt.push_str("\n\n## Parent's children\n");
            for child in children {
                let _ = writeln!(prompt, "- {} ({} months)", child.name, child.age_in_months);
            }
            prompt.push_str("No specific child was selected; ask which child the question is about if it matters.");
        }
    }

    if let Some(hits) = &context.vector_search_results {
        if !hits.is_empty() {
            prompt.push_str("\n\n## Most relevant information\n");
            for (index, hit) in hits.iter().take(MAX_VECTOR_SNIPPETS).enumerate() {
                let _ = writeln!(
                    prompt,
                    "{}. [{}, {:.0}% relevant] {}",
                    index + 1,
                    hit.source_type,
                    hit.similarity * 100.0,
                    hit.content.trim()
                );
            }
        }
    }

    let records: Vec<&DailyRecord> = context.relevant_records.iter().map(|r| &r.record).collect();
    if !records.is_empty() {
        render_records(&mut prompt, &records);
    }

    let conversations: Vec<&ChatHistory> = if context.relevant_chat_history.is_empty() {
        context.recent_chats.iter().flatten().collect()
    } else {
        context.relevant_chat_history.iter().map(|c| &c.chat).collect()
    };
    if !conversations.is_empty() {
        prompt.push_str("\n\n## Recent relevant conversations\n");
        for chat in conversations.into_iter().take(MAX_CONVERSATIONS) {
            let _ = writeln!(prompt, "Parent: {}", chat.user_message.trim());
            let _ = writeln!(prompt, "Assistant: {}", chat.ai_response.trim());
        }
    }

    prompt.push_str("\n\n## Response guidelines\n");
    for (index, guideline) in GUIDELINES.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", index + 1, guideline);
    }

    prompt.trim_end().to_string()
}

fn render_child(prompt: &mut String, child: &ChildSummary) {
    prompt.push_str("\n\n## Child\n");
    let _ = writeln!(prompt, "Name: {}", child.name);
    let _ = writeln!(prompt, "Age: {} months", child.age_in_months);
    if let Some(gender) = child.gender.as_deref().filter(|g| !g.trim().is_empty()) {
        let _ = writeln!(prompt, "Gender: {}", gender);
    }

    if !child.allergy_info.is_empty() {
        prompt.push_str("\n## Allergies\n");
        let _ = writeln!(
            prompt,
            "IMPORTANT: {} is allergic to {}. You must never suggest foods, recipes or products containing these allergens or ingredients derived from them.",
            child.name,
            child.allergy_info.join(", ")
        );
    }

    prompt.push_str("\n## Developmental stage\n");
    prompt.push_str(developmental_blurb(child.age_in_months));
}

fn render_records(prompt: &mut String, records: &[&DailyRecord]) {
    let mut by_type: BTreeMap<&str, Vec<&DailyRecord>> = BTreeMap::new();
    for record in records {
        by_type.entry(record.record_type.as_str()).or_default().push(record);
    }

    prompt.push_str("\n\n## Daily records\n");
    for (record_type, group) in by_type {
        let _ = writeln!(prompt, "### {}", record_type);
        for record in group.into_iter().take(MAX_RECORDS_PER_TYPE) {
            let _ = writeln!(prompt, "- {}", record.describe());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ChildListItem, RelevantRecord, VectorSearchHit};
    use crate::domain::value_objects::SourceType;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn child(age: u32, allergies: &[&str]) -> ChildSummary {
        ChildSummary {
            id: 1,
            name: "Leo".to_string(),
            age_in_months: age,
            gender: Some("male".to_string()),
            allergy_info: allergies.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn record(id: i64, record_type: &str, hour: u32) -> RelevantRecord {
        RelevantRecord {
            record: DailyRecord {
                id,
                child_id: 1,
                record_type: record_type.to_string(),
                note: None,
                details: json!({}),
                recorded_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            },
            similarity: None,
        }
    }

    fn hit(content: &str, similarity: f32) -> VectorSearchHit {
        VectorSearchHit {
            content: content.to_string(),
            source_type: SourceType::Record,
            source_id: 1,
            similarity,
            metadata: json!({}),
        }
    }

    #[test]
    fn test_age_bucket_upper_bounds_are_inclusive() {
        assert_eq!(age_bucket(0).map(|b| b.0), Some(1));
        assert_eq!(age_bucket(9).map(|b| b.0), Some(9));
        assert_eq!(age_bucket(10).map(|b| b.0), Some(12));
        assert_eq!(age_bucket(60).map(|b| b.0), Some(60));
        assert_eq!(age_bucket(61).map(|b| b.0), None);
        assert_eq!(developmental_blurb(61), OLDER_CHILD_BLURB);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let context = Context {
            child: Some(child(14, &["Milk"])),
            vector_search_results: Some(vec![hit("slept 11 hours", 0.91)]),
            relevant_records: vec![record(2, "sleep", 20), record(1, "feeding", 8)],
            ..Default::default()
        };

        assert_eq!(
            format_context_to_prompt(&context),
            format_context_to_prompt(&context.clone())
        );
    }

    #[test]
    fn test_sections_render_in_fixed_order() {
        let context = Context {
            child: Some(child(9, &["Milk", "Egg"])),
            vector_search_results: Some(vec![hit("ate oatmeal", 0.876)]),
            relevant_records: vec![record(1, "sleep", 20), record(2, "feeding", 8)],
            ..Default::default()
        };
        let prompt = format_context_to_prompt(&context);

        let order = [
            "You are Nestling",
            "## Child",
            "## Allergies",
            "## Developmental stage",
            "## Most relevant information",
            "## Daily records",
            "## Response guidelines",
        ];
        let positions: Vec<usize> = order.iter().map(|s| prompt.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(prompt.contains("allergic to Milk, Egg"));
        assert!(prompt.contains(developmental_blurb(9)));
        assert!(prompt.contains("[record, 88% relevant] ate oatmeal"));
        assert!(prompt.find("### feeding").unwrap() < prompt.find("### sleep").unwrap());
        assert!(prompt.contains("10. "));
    }

    #[test]
    fn test_snippets_are_capped_at_five() {
        let hits = (0..8).map(|i| hit(&format!("snippet-{}", i), 0.9)).collect();
        let context = Context {
            child: Some(child(20, &[])),
            vector_search_results: Some(hits),
            ..Default::default()
        };
        let prompt = format_context_to_prompt(&context);

        assert!(prompt.contains("snippet-4"));
        assert!(!prompt.contains("snippet-5"));
        assert!(!prompt.contains("## Allergies"));
    }

    #[test]
    fn test_overview_without_child_lists_children() {
        let context = Context {
            available_children: Some(vec![ChildListItem {
                id: 3,
                name: "Ada".to_string(),
                age_in_months: 30,
            }]),
            recent_chats: Some(Vec::new()),
            ..Default::default()
        };
        let prompt = format_context_to_prompt(&context);

        assert!(prompt.contains("- Ada (30 months)"));
        assert!(!prompt.contains("## Child\n"));
        assert!(!prompt.contains("## Recent relevant conversations"));
    }
}
