use serde::Serialize;

use super::{ChatHistory, ChildListItem, ChildSummary, DailyRecord};
use crate::domain::value_objects::SourceType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorSearchHit {
    pub content: String,
    pub source_type: SourceType,
    pub source_id: i64,
    pub similarity: f32,
    pub metadata: serde_json::Value,
}

/// A record pulled into the context, scored when it came from the vector path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantRecord {
    pub record: DailyRecord,
    pub similarity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantChat {
    pub chat: ChatHistory,
    pub similarity: Option<f32>,
}

/// Per-request grounding assembled before a model call. Never persisted.
///
/// `vector_search_results` is `None` when the vector path was not usable and
/// the unscored fallback filled the record/chat lists, and `Some(vec![])` when
/// the search ran but found nothing above the threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    pub child: Option<ChildSummary>,
    pub vector_search_results: Option<Vec<VectorSearchHit>>,
    pub relevant_records: Vec<RelevantRecord>,
    pub relevant_chat_history: Vec<RelevantChat>,
    pub available_children: Option<Vec<ChildListItem>>,
    pub recent_chats: Option<Vec<ChatHistory>>,
}

impl Context {
    /// True for a child-scoped context built without the vector path. The
    /// no-child overview never searches and is not a fallback.
    pub fn used_fallback(&self) -> bool {
        self.available_children.is_none() && self.vector_search_results.is_none()
    }

    pub fn allergens(&self) -> &[String] {
        self.child
            .as_ref()
            .map(|child| child.allergy_info.as_slice())
            .unwrap_or(&[])
    }

    /// Ordered, human readable description of what grounded the answer.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(child) = &self.child {
            lines.push(format!(
                "Child: {} ({} months)",
                child.name, child.age_in_months
            ));
            if !child.allergy_info.is_empty() {
                lines.push(format!("Allergies: {}", child.allergy_info.join(", ")));
            }
        }

        match &self.vector_search_results {
            Some(hits) => lines.push(format!("Vector search matches: {}", hits.len())),
            None if self.used_fallback() => lines.push("Fallback context used".to_string()),
            None => {}
        }

        if !self.relevant_records.is_empty() {
            lines.push(format!("Relevant records: {}", self.relevant_records.len()));
        }
        if !self.relevant_chat_history.is_empty() {
            lines.push(format!(
                "Relevant conversations: {}",
                self.relevant_chat_history.len()
            ));
        }
        if let Some(children) = &self.available_children {
            lines.push(format!("Available children: {}", children.len()));
        }
        if let Some(chats) = &self.recent_chats {
            lines.push(format!("Recent conversations: {}", chats.len()));
        }

        lines
    }
}
