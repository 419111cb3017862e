//! Heuristic selectivity estimation for pre-filters.
//!
//! Selectivity is the estimated fraction of the corpus that passes a
//! filter. Keys are assumed independent, so per-key estimates multiply.
//! The figures are typical repository distributions, not measurements.

use std::collections::BTreeMap;

use reporag_db::{FilterCondition, MetadataValue};

use super::{FilterRule, FilterSet};

pub const MIN_SELECTIVITY: f64 = 0.01;
pub const MAX_SELECTIVITY: f64 = 1.0;

/// How one metadata key maps a condition to a fraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    /// Fraction per value; values not in the table use `default`. Lists
    /// sum their members.
    Categorical {
        fractions: BTreeMap<String, f64>,
        default: f64,
    },
    /// Depth cutoff: `≤ d` passes `min(base + step·d, 1)`, any exact depth
    /// passes `exact`, ranges without an upper bound are non-restrictive.
    Depth { base: f64, step: f64, exact: f64 },
}

impl Dimension {
    fn categorical(entries: &[(&str, f64)], default: f64) -> Self {
        Self::Categorical {
            fractions: entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            default,
        }
    }

    fn estimate(&self, condition: &FilterCondition) -> f64 {
        match (self, condition) {
            (Self::Categorical { fractions, default }, FilterCondition::Eq(value)) => {
                lookup(fractions, *default, value)
            }
            (Self::Categorical { fractions, default }, FilterCondition::In(values)) => {
                values.iter().map(|v| lookup(fractions, *default, v)).sum()
            }
            (Self::Categorical { .. }, FilterCondition::Range(_)) => 1.0,
            (Self::Depth { base, step, .. }, FilterCondition::Range(bounds)) => match bounds.lte {
                Some(depth) => (base + step * depth).min(1.0),
                None => 1.0,
            },
            (Self::Depth { exact, .. }, _) => *exact,
        }
    }
}

fn lookup(fractions: &BTreeMap<String, f64>, default: f64, value: &MetadataValue) -> f64 {
    value
        .as_str()
        .and_then(|s| fractions.get(s))
        .copied()
        .unwrap_or(default)
}

/// Per-key selectivity table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectivityTable {
    dimensions: BTreeMap<String, Dimension>,
}

impl Default for SelectivityTable {
    fn default() -> Self {
        Self::empty()
            .with(
                "file_type",
                Dimension::categorical(
                    &[
                        ("code", 0.60),
                        ("test", 0.15),
                        ("docs", 0.15),
                        ("config", 0.05),
                        ("build", 0.05),
                    ],
                    0.10,
                ),
            )
            .with(
                "language",
                Dimension::categorical(
                    &[("python", 0.40), ("javascript", 0.30), ("typescript", 0.15)],
                    0.05,
                ),
            )
            .with(
                "directory_depth",
                Dimension::Depth {
                    base: 0.2,
                    step: 0.2,
                    exact: 0.2,
                },
            )
    }
}

impl SelectivityTable {
    /// A table with no dimensions: every filter is non-restrictive.
    pub fn empty() -> Self {
        Self {
            dimensions: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, dimension: Dimension) -> Self {
        self.dimensions.insert(key.into(), dimension);
        self
    }

    /// Estimate for a single key. Unknown keys and malformed values are
    /// non-restrictive (1.0), matching what [`FilterSet::to_native`] drops.
    pub fn estimate_key(&self, key: &str, rule: &FilterRule) -> f64 {
        match (self.dimensions.get(key), rule) {
            (Some(dimension), FilterRule::Condition(condition)) if condition.validate(key).is_ok() => {
                dimension.estimate(condition)
            }
            _ => 1.0,
        }
    }

    /// Combined estimate, clamped to `[0.01, 1.0]`. An empty filter is 1.0.
    pub fn estimate(&self, filters: &FilterSet) -> f64 {
        if filters.is_empty() {
            return 1.0;
        }
        let product: f64 = filters
            .iter()
            .map(|(key, rule)| self.estimate_key(key, rule))
            .product();
        clamp_selectivity(product)
    }
}

pub fn clamp_selectivity(value: f64) -> f64 {
    if value.is_nan() {
        return MAX_SELECTIVITY;
    }
    value.clamp(MIN_SELECTIVITY, MAX_SELECTIVITY)
}
