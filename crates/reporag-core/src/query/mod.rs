//! Query understanding.
//!
//! Pure text transforms: intent detection, entity extraction, abbreviation
//! expansion and intent-driven rewriting. Nothing here touches the network
//! or the index, and every function is deterministic.

mod entities;
mod expansion;
mod intent;

use serde::{Deserialize, Serialize};

pub use entities::{extract_entities, Entities, CODE_KEYWORDS};
pub use expansion::{QueryExpander, TECH_EXPANSIONS};
pub use intent::{detect_intent, QueryIntent};

/// Number of trailing history messages considered for context.
pub const HISTORY_WINDOW: usize = 4;

// ============================================================================
// Chat history
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    #[default]
    User,
    Assistant,
    System,
}

/// One turn of prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Processed query
// ============================================================================

/// Everything the pipeline needs to know about a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedQuery {
    pub original: String,
    /// Original text plus abbreviation expansions.
    pub expanded: String,
    /// Expanded text plus intent-specific search vocabulary.
    pub rewritten: String,
    pub intent: QueryIntent,
    pub entities: Entities,
    /// Prior user questions, one `Previous question: ...` line each.
    pub context: String,
}

/// Append intent-specific vocabulary to steer the vector search.
pub fn rewrite_query(expanded: &str, intent: QueryIntent, entities: &Entities) -> String {
    let mut rewritten = expanded.to_string();

    match intent {
        QueryIntent::Implementation => {
            rewritten.push_str(" code implementation source");
            if !entities.functions.is_empty() {
                rewritten.push_str(" function ");
                rewritten.push_str(&join(&entities.functions));
            }
            if !entities.classes.is_empty() {
                rewritten.push_str(" class ");
                rewritten.push_str(&join(&entities.classes));
            }
        }
        QueryIntent::Explanation => rewritten.push_str(" explanation how it works logic flow"),
        QueryIntent::Debugging => rewritten.push_str(" error handling debugging troubleshooting"),
        QueryIntent::Architecture => {
            rewritten.push_str(" architecture structure design pattern organization")
        }
        QueryIntent::Usage => rewritten.push_str(" usage example how to use tutorial"),
        _ => {}
    }

    rewritten
}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flatten the last [`HISTORY_WINDOW`] messages, keeping user turns only.
pub fn history_context(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .filter(|msg| msg.role == ChatRole::User)
        .map(|msg| format!("Previous question: {}\n", msg.content))
        .collect()
}

/// Single entry point for query understanding.
#[derive(Debug, Clone, Default)]
pub struct QueryProcessor {
    expander: QueryExpander,
}

impl QueryProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn expand_query(&self, query: &str) -> String {
        self.expander.expand(query)
    }

    /// Detect, extract, expand, rewrite, in that order.
    pub fn process(&self, query: &str, history: &[ChatMessage]) -> ProcessedQuery {
        let intent = detect_intent(query);
        let entities = extract_entities(query);
        let expanded = self.expand_query(query);
        let rewritten = rewrite_query(&expanded, intent, &entities);

        ProcessedQuery {
            original: query.to_string(),
            expanded,
            rewritten,
            intent,
            entities,
            context: history_context(history),
        }
    }
}
