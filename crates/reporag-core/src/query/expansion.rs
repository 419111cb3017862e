//! Additive expansion of technical abbreviations.

use regex::{Regex, RegexBuilder};

/// Built-in abbreviation table, applied in this order.
pub const TECH_EXPANSIONS: [(&str, &str); 23] = [
    ("api", "API application programming interface"),
    ("db", "database"),
    ("auth", "authentication"),
    ("config", "configuration"),
    ("env", "environment"),
    ("repo", "repository"),
    ("func", "function"),
    ("var", "variable"),
    ("params", "parameters"),
    ("args", "arguments"),
    ("async", "asynchronous"),
    ("sync", "synchronous"),
    ("ui", "user interface"),
    ("ux", "user experience"),
    ("crud", "create read update delete"),
    ("http", "HTTP hypertext transfer protocol"),
    ("rest", "REST RESTful"),
    ("json", "JSON"),
    ("jwt", "JWT JSON web token"),
    ("oauth", "OAuth authentication"),
    ("sql", "SQL database query"),
    ("nosql", "NoSQL database"),
    ("orm", "ORM object relational mapping"),
];

#[derive(Debug, Clone)]
struct Expansion {
    pattern: Regex,
    phrase: String,
}

/// Appends the expansion phrase of every abbreviation found in a query.
///
/// The original text is never altered; phrases are only appended, so the
/// query's own terms still match downstream.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    entries: Vec<Expansion>,
}

impl Default for QueryExpander {
    fn default() -> Self {
        let mut expander = Self {
            entries: Vec::with_capacity(TECH_EXPANSIONS.len()),
        };
        for (abbr, phrase) in TECH_EXPANSIONS {
            expander.push(abbr, phrase);
        }
        expander
    }
}

impl QueryExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an abbreviation after the built-in ones.
    pub fn with_abbreviation(mut self, abbr: &str, phrase: impl Into<String>) -> Self {
        self.push(abbr, phrase);
        self
    }

    fn push(&mut self, abbr: &str, phrase: impl Into<String>) {
        let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(abbr)))
            .case_insensitive(true)
            .build();
        if let Ok(pattern) = pattern {
            self.entries.push(Expansion {
                pattern,
                phrase: phrase.into(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand `query`. Each matching abbreviation contributes its phrase
    /// once, regardless of how often it occurs.
    pub fn expand(&self, query: &str) -> String {
        let mut expanded = query.to_string();
        for entry in &self.entries {
            if entry.pattern.is_match(query) {
                expanded.push(' ');
                expanded.push_str(&entry.phrase);
            }
        }
        expanded
    }
}
