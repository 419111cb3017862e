//! Query intent classification.
//!
//! Each intent owns a list of case-insensitive patterns. Intents are checked
//! in [`QueryIntent::DETECTION_ORDER`] and the first intent with any matching
//! pattern wins, so several intents may match a query but only the earliest
//! one is reported.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of query intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// Short overview of a project or component.
    Summary,
    /// Direct, brief question.
    Qna,
    /// Write or change code.
    Coding,
    /// How or why something works.
    Explanation,
    /// Locate and show the code for something.
    Implementation,
    /// Errors, failures, bugs.
    Debugging,
    /// Structure and design.
    Architecture,
    /// How to use something.
    Usage,
    /// Differences between alternatives.
    Comparison,
    /// Fallback when nothing matches.
    General,
}

impl QueryIntent {
    /// Evaluation order for detection. `General` is the fallback and is
    /// not listed.
    pub const DETECTION_ORDER: [QueryIntent; 9] = [
        QueryIntent::Summary,
        QueryIntent::Qna,
        QueryIntent::Coding,
        QueryIntent::Explanation,
        QueryIntent::Implementation,
        QueryIntent::Debugging,
        QueryIntent::Architecture,
        QueryIntent::Usage,
        QueryIntent::Comparison,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Qna => "qna",
            Self::Coding => "coding",
            Self::Explanation => "explanation",
            Self::Implementation => "implementation",
            Self::Debugging => "debugging",
            Self::Architecture => "architecture",
            Self::Usage => "usage",
            Self::Comparison => "comparison",
            Self::General => "general",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Summary => &[
                r"\bsummar(y|ize)\b",
                r"\bbrief\b",
                r"\boverview\b",
                r"\btl;?dr\b",
                r"\bshort\b",
                r"\bwhat\s+is\s+this\s+project\b",
            ],
            Self::Qna => &[
                r"\bwhat\s+is\b",
                r"\bwho\b",
                r"\bwhen\b",
                r"\bdoes\s+it\b",
                r"\bis\s+there\b",
                r"\bcan\s+it\b",
                r"\bsimple\b",
                r"\bquick\b",
            ],
            Self::Coding => &[
                r"\bwrite\b",
                r"\bgenerate\b",
                r"\bcreate\b",
                r"\bimplement\b",
                r"\brefactor\b",
                r"\boptimize\b",
                r"\bcode\s+for\b",
            ],
            Self::Explanation => &[
                r"\bhow\s+(does|do|is|are)\b",
                r"\bwhat\s+(is|are|does)\b",
                r"\bexplain\b",
                r"\bdescribe\b",
                r"\bwhy\s+(does|do|is|are)\b",
                r"\bcan\s+you\s+explain\b",
            ],
            Self::Implementation => &[
                r"\bshow\s+me\b",
                r"\bfind\s+(the\s+)?(code|function|class|method)\b",
                r"\bwhere\s+is\b",
                r"\blocate\b",
                r"\bget\s+(the\s+)?(code|implementation)\b",
            ],
            Self::Debugging => &[
                r"\bwhy\s+(is|does|isn't|doesn't)\b",
                r"\berror\b",
                r"\bfail(ing|s|ed)?\b",
                r"\bbug\b",
                r"\bissue\b",
                r"\bproblem\b",
                r"\bnot\s+working\b",
                r"\bfix\b",
            ],
            Self::Architecture => &[
                r"\barchitecture\b",
                r"\bstructure\b",
                r"\borganization\b",
                r"\bdesign\b",
                r"\bpattern\b",
                r"\boverall\b",
                r"\bhigh[\s-]level\b",
            ],
            Self::Usage => &[
                r"\bhow\s+to\s+use\b",
                r"\bhow\s+can\s+i\b",
                r"\bexample\b",
                r"\busage\b",
                r"\btutorial\b",
            ],
            Self::Comparison => &[
                r"\bdifference\s+between\b",
                r"\bcompare\b",
                r"\bvs\b",
                r"\bversus\b",
                r"\bor\b.*\bor\b",
            ],
            Self::General => &[],
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::DETECTION_ORDER
            .iter()
            .chain(std::iter::once(&Self::General))
            .find(|intent| intent.as_str() == lower)
            .copied()
            .ok_or_else(|| format!("Unknown intent: '{}'", s))
    }
}

/// Compiled pattern table in detection order.
fn intent_table() -> &'static [(QueryIntent, Vec<Regex>)] {
    static TABLE: OnceLock<Vec<(QueryIntent, Vec<Regex>)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        QueryIntent::DETECTION_ORDER
            .iter()
            .map(|intent| {
                let compiled = intent
                    .patterns()
                    .iter()
                    .filter_map(|p| Regex::new(p).ok())
                    .collect();
                (*intent, compiled)
            })
            .collect()
    })
}

/// Classify a query. Total and deterministic: every input yields exactly
/// one intent, `General` when no pattern matches.
pub fn detect_intent(query: &str) -> QueryIntent {
    let lower = query.to_lowercase();
    intent_table()
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(&lower)))
        .map(|(intent, _)| *intent)
        .unwrap_or(QueryIntent::General)
}
