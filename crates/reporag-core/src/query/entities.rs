//! Lightweight code-entity extraction from query text.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Code-related nouns recognized as substrings of the lower-cased query.
pub const CODE_KEYWORDS: [&str; 25] = [
    "function",
    "class",
    "method",
    "variable",
    "constant",
    "module",
    "package",
    "import",
    "export",
    "return",
    "async",
    "await",
    "promise",
    "callback",
    "handler",
    "component",
    "service",
    "controller",
    "model",
    "view",
    "route",
    "endpoint",
    "middleware",
    "hook",
    "util",
];

/// Entities found in a query. Each list is a set; iteration order is
/// sorted, which keeps rewritten queries deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entities {
    /// Identifiers immediately followed by `(`.
    pub functions: BTreeSet<String>,
    /// Capitalized identifiers.
    pub classes: BTreeSet<String>,
    /// `name.ext` tokens.
    pub files: BTreeSet<String>,
    /// snake_case identifiers that are not called.
    pub variables: BTreeSet<String>,
    /// Entries of [`CODE_KEYWORDS`] present in the query.
    pub keywords: BTreeSet<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.classes.is_empty()
            && self.files.is_empty()
            && self.variables.is_empty()
            && self.keywords.is_empty()
    }
}

struct EntityPatterns {
    functions: Vec<Regex>,
    class: Option<Regex>,
    file: Option<Regex>,
    variable: Option<Regex>,
}

fn patterns() -> &'static EntityPatterns {
    static PATTERNS: OnceLock<EntityPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| EntityPatterns {
        functions: [
            r"\b([a-z_][a-z0-9_]*)\s*\(", // snake_case
            r"\b([a-z][a-zA-Z0-9]*)\s*\(", // camelCase
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect(),
        class: Regex::new(r"\b([A-Z][a-zA-Z0-9]*)\b").ok(),
        file: Regex::new(r"\b([a-zA-Z0-9_-]+\.[a-z]{2,4})\b").ok(),
        variable: Regex::new(r"\b([a-z][a-z0-9]*(?:_[a-z0-9]+)+)\b").ok(),
    })
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Extract candidate functions, classes, files, variables and keywords.
pub fn extract_entities(query: &str) -> Entities {
    let p = patterns();
    let mut entities = Entities::default();

    for re in &p.functions {
        entities.functions.extend(captures(re, query));
    }
    if let Some(re) = &p.class {
        entities.classes.extend(captures(re, query));
    }
    if let Some(re) = &p.file {
        entities.files.extend(captures(re, query));
    }
    if let Some(re) = &p.variable {
        entities.variables.extend(
            captures(re, query)
                .into_iter()
                .filter(|name| !entities.functions.contains(name)),
        );
    }

    let lower = query.to_lowercase();
    entities.keywords = CODE_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| kw.to_string())
        .collect();

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_functions_snake_and_camel() {
        let e = extract_entities("why does load_config() call parseArgs (twice)?");
        assert!(e.functions.contains("load_config"));
        assert!(e.functions.contains("parseArgs"));
    }

    #[test]
    fn test_classes_and_files() {
        let e = extract_entities("Where is UserService defined in user_service.py");
        assert_eq!(e.classes, set(&["UserService", "Where"]));
        assert_eq!(e.files, set(&["user_service.py"]));
    }

    #[test]
    fn test_variables_exclude_called_names() {
        let e = extract_entities("is max_retries used by fetch_all() ?");
        assert_eq!(e.variables, set(&["max_retries"]));
        assert!(e.functions.contains("fetch_all"));
    }

    #[test]
    fn test_keywords_are_substrings() {
        let e = extract_entities("Which middleware handles routes?");
        // "routes" contains "route"; "handles" does not contain "handler".
        assert_eq!(e.keywords, set(&["middleware", "route"]));
    }

    #[test]
    fn test_duplicates_collapse() {
        let e = extract_entities("run() then run() again");
        assert_eq!(e.functions, set(&["run"]));
    }

    #[test]
    fn test_empty_query() {
        assert!(extract_entities("").is_empty());
    }
}
