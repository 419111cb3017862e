//! Answer confidence from the final source set.
//!
//! Three additive factors: source similarity (up to 0.4), number of
//! sources (up to 0.3) and number of code sources (up to 0.3).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sources::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    /// In `[0, 1]`, rounded to 2 decimals.
    pub score: f64,
    pub level: ConfidenceLevel,
    pub reason: String,
}

impl Confidence {
    fn fixed(score: f64, level: ConfidenceLevel, reason: &str) -> Self {
        Self {
            score,
            level,
            reason: reason.to_string(),
        }
    }

    pub fn greeting() -> Self {
        Self::fixed(1.0, ConfidenceLevel::High, "Greeting response")
    }

    pub fn no_sources() -> Self {
        Self::fixed(0.0, ConfidenceLevel::Low, "No sources found")
    }

    pub fn error() -> Self {
        Self::fixed(0.0, ConfidenceLevel::Low, "Error occurred")
    }
}

/// Estimate confidence for an answer grounded on `sources`.
///
/// Similarity is the index score of each source; a source without one
/// counts as 0.
pub fn estimate_confidence(sources: &[Source]) -> Confidence {
    if sources.is_empty() {
        return Confidence::no_sources();
    }

    let avg_similarity =
        sources.iter().map(|s| s.semantic_score.unwrap_or(0.0)).sum::<f64>() / sources.len() as f64;
    let code_sources = sources.iter().filter(|s| s.is_code()).count();

    let quality: f64 = if avg_similarity > 0.7 {
        0.4
    } else if avg_similarity > 0.5 {
        0.3
    } else if avg_similarity > 0.3 {
        0.2
    } else {
        0.1
    };

    let coverage: f64 = match sources.len() {
        n if n >= 5 => 0.3,
        n if n >= 3 => 0.2,
        _ => 0.1,
    };

    let code: f64 = match code_sources {
        n if n >= 3 => 0.3,
        n if n >= 1 => 0.2,
        _ => 0.1,
    };

    let score = ((quality + coverage + code).min(1.0) * 100.0).round() / 100.0;

    let (level, reason) = if score >= 0.75 {
        (
            ConfidenceLevel::High,
            "Strong source relevance with multiple code references",
        )
    } else if score >= 0.5 {
        (
            ConfidenceLevel::Medium,
            "Good source coverage with relevant matches",
        )
    } else {
        (ConfidenceLevel::Low, "Limited source relevance or coverage")
    };

    Confidence::fixed(score, level, reason)
}
