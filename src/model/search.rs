//! Smart search response shape.

use serde::{Deserialize, Serialize};

use super::WorkItem;

/// Which of the two response shapes a smart search produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    List,
    Narrative,
}

/// Result of interpreting a free-text query.
///
/// For `List`, `items` is the filtered result and `narrative` is `None`.
/// For `Narrative`, `items` is the evidence set handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSearchResult {
    pub response_type: ResponseType,
    pub items: Vec<WorkItem>,
    pub narrative: Option<String>,
    pub explanation: String,
}

impl SmartSearchResult {
    #[must_use]
    pub fn list(items: Vec<WorkItem>, explanation: String) -> Self {
        Self {
            response_type: ResponseType::List,
            items,
            narrative: None,
            explanation,
        }
    }

    #[must_use]
    pub fn narrative(items: Vec<WorkItem>, narrative: String, explanation: String) -> Self {
        Self {
            response_type: ResponseType::Narrative,
            items,
            narrative: Some(narrative),
            explanation,
        }
    }
}
