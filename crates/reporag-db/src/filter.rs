//! Metadata filter wire contract.
//!
//! A filter is a conjunction of per-key conditions. On the wire each
//! condition uses comparator tags:
//!
//! | Wire form                         | Condition        |
//! |-----------------------------------|------------------|
//! | `"code"` / `{"$eq": "code"}`      | `Eq`             |
//! | `["py", "js"]` / `{"$in": [...]}` | `In`             |
//! | `{"$gte": 1, "$lt": 5}`           | `Range`          |
//!
//! The same types are emitted as index-native pre-filters and evaluated
//! in-process as post-filters, so both stages interpret a condition
//! identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chunk::{Metadata, MetadataValue};
use crate::error::{DbError, DbResult};

// ============================================================================
// RangeBounds
// ============================================================================

/// Numeric range; every bound is optional and bounds combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeBounds {
    pub gte: Option<f64>,
    pub lte: Option<f64>,
    pub gt: Option<f64>,
    pub lt: Option<f64>,
}

impl RangeBounds {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none() && self.gt.is_none() && self.lt.is_none()
    }

    fn bounds(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("$gte", self.gte),
            ("$lte", self.lte),
            ("$gt", self.gt),
            ("$lt", self.lt),
        ]
    }

    pub fn contains(&self, x: f64) -> bool {
        self.gte.is_none_or(|b| x >= b)
            && self.lte.is_none_or(|b| x <= b)
            && self.gt.is_none_or(|b| x > b)
            && self.lt.is_none_or(|b| x < b)
    }
}

// ============================================================================
// FilterCondition
// ============================================================================

/// Condition on a single metadata key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum FilterCondition {
    /// Value equality (booleans, numbers and strings).
    Eq(MetadataValue),
    /// Set membership.
    In(Vec<MetadataValue>),
    /// Numeric range.
    Range(RangeBounds),
}

/// Outcome of evaluating a condition against one metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCheck {
    Pass,
    Fail,
    /// The condition could not be evaluated against this value, e.g. a
    /// range over a text field.
    Malformed(String),
}

impl FilterCondition {
    pub fn eq(value: impl Into<MetadataValue>) -> Self {
        Self::Eq(value.into())
    }

    pub fn one_of<V: Into<MetadataValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::In(values.into_iter().map(Into::into).collect())
    }

    pub fn range(bounds: RangeBounds) -> Self {
        Self::Range(bounds)
    }

    /// Check that the condition is well formed.
    ///
    /// Empty `In` lists, ranges without bounds and non-finite numbers
    /// cannot be expressed as a native filter.
    pub fn validate(&self, key: &str) -> DbResult<()> {
        let finite = |v: &MetadataValue| match v {
            MetadataValue::Float(f) => f.is_finite(),
            _ => true,
        };
        match self {
            Self::Eq(v) if !finite(v) => Err(DbError::malformed_filter(key, "non-finite value")),
            Self::In(values) if values.is_empty() => {
                Err(DbError::malformed_filter(key, "$in list is empty"))
            }
            Self::In(values) if !values.iter().all(finite) => {
                Err(DbError::malformed_filter(key, "non-finite value in $in list"))
            }
            Self::Range(bounds) if bounds.is_empty() => {
                Err(DbError::malformed_filter(key, "range has no bounds"))
            }
            Self::Range(bounds) if bounds.bounds().iter().any(|(_, b)| b.is_some_and(|x| !x.is_finite())) => {
                Err(DbError::malformed_filter(key, "range bound is not finite"))
            }
            _ => Ok(()),
        }
    }

    /// Evaluate against a metadata value. A missing value never passes.
    pub fn check(&self, value: Option<&MetadataValue>) -> FilterCheck {
        let Some(value) = value else {
            return FilterCheck::Fail;
        };
        let passed = match self {
            Self::Eq(expected) => value.matches(expected),
            Self::In(values) => values.iter().any(|v| value.matches(v)),
            Self::Range(bounds) => match value.as_f64() {
                Some(x) => bounds.contains(x),
                None => {
                    return FilterCheck::Malformed(format!(
                        "range comparison against non-numeric value '{}'",
                        value
                    ))
                }
            },
        };
        if passed {
            FilterCheck::Pass
        } else {
            FilterCheck::Fail
        }
    }

    /// Parse the wire form of a condition for `key`.
    pub fn from_json(key: &str, value: &Value) -> DbResult<Self> {
        match value {
            Value::Array(items) => parse_list(key, items).map(Self::In),
            Value::Object(ops) => parse_operators(key, ops),
            other => MetadataValue::from_json(other)
                .map(Self::Eq)
                .ok_or_else(|| DbError::malformed_filter(key, "null is not a filter value")),
        }
    }

    /// Emit the wire form with explicit comparator tags.
    pub fn to_json(&self) -> Value {
        let mut ops = Map::new();
        match self {
            Self::Eq(v) => {
                ops.insert("$eq".to_string(), v.to_json());
            }
            Self::In(values) => {
                ops.insert(
                    "$in".to_string(),
                    Value::Array(values.iter().map(MetadataValue::to_json).collect()),
                );
            }
            Self::Range(bounds) => {
                for (op, bound) in bounds.bounds() {
                    if let Some(b) = bound {
                        ops.insert(op.to_string(), Value::from(b));
                    }
                }
            }
        }
        Value::Object(ops)
    }
}

fn parse_list(key: &str, items: &[Value]) -> DbResult<Vec<MetadataValue>> {
    items
        .iter()
        .map(|item| {
            MetadataValue::from_json(item)
                .ok_or_else(|| DbError::malformed_filter(key, "list items must be scalars"))
        })
        .collect()
}

fn parse_operators(key: &str, ops: &Map<String, Value>) -> DbResult<FilterCondition> {
    if ops.is_empty() {
        return Err(DbError::malformed_filter(key, "empty operator object"));
    }

    let number = |op: &str, v: &Value| {
        v.as_f64()
            .ok_or_else(|| DbError::malformed_filter(key, format!("{} expects a number", op)))
    };

    let mut bounds = RangeBounds::default();
    let mut exact = None;
    for (op, v) in ops {
        match op.as_str() {
            "$eq" => {
                exact = Some(FilterCondition::Eq(MetadataValue::from_json(v).ok_or_else(
                    || DbError::malformed_filter(key, "$eq expects a scalar"),
                )?))
            }
            "$in" => {
                let items = v
                    .as_array()
                    .ok_or_else(|| DbError::malformed_filter(key, "$in expects a list"))?;
                exact = Some(FilterCondition::In(parse_list(key, items)?));
            }
            "$gte" => bounds.gte = Some(number(op, v)?),
            "$lte" => bounds.lte = Some(number(op, v)?),
            "$gt" => bounds.gt = Some(number(op, v)?),
            "$lt" => bounds.lt = Some(number(op, v)?),
            unknown => {
                return Err(DbError::malformed_filter(
                    key,
                    format!("unknown operator '{}'", unknown),
                ))
            }
        }
    }

    match exact {
        Some(_) if ops.len() > 1 => Err(DbError::malformed_filter(
            key,
            "$eq/$in cannot be combined with other operators",
        )),
        Some(condition) => Ok(condition),
        None => Ok(FilterCondition::Range(bounds)),
    }
}

impl TryFrom<Value> for FilterCondition {
    type Error = DbError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json("<value>", &value)
    }
}

impl From<FilterCondition> for Value {
    fn from(condition: FilterCondition) -> Self {
        condition.to_json()
    }
}

// ============================================================================
// FilterExpression
// ============================================================================

/// Conjunction of per-key conditions, as sent to a vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpression {
    clauses: BTreeMap<String, FilterCondition>,
}

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style clause insert. A later clause for the same key replaces
    /// the earlier one.
    pub fn with(mut self, key: impl Into<String>, condition: FilterCondition) -> Self {
        self.clauses.insert(key.into(), condition);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, condition: FilterCondition) {
        self.clauses.insert(key.into(), condition);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> impl Iterator<Item = (&String, &FilterCondition)> {
        self.clauses.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.clauses.keys().map(String::as_str)
    }

    /// Whether `metadata` satisfies every clause. Clauses that cannot be
    /// evaluated count as failures.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.clauses
            .iter()
            .all(|(key, condition)| condition.check(metadata.get(key)) == FilterCheck::Pass)
    }

    /// Parse `{key: wire-condition, ...}`.
    pub fn from_json(value: &Value) -> DbResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DbError::malformed_filter("<root>", "filter must be an object"))?;
        let mut expression = Self::new();
        for (key, raw) in object {
            expression.insert(key.clone(), FilterCondition::from_json(key, raw)?);
        }
        Ok(expression)
    }

    /// Emit `{key: {"$op": value}, ...}`.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.clauses
                .iter()
                .map(|(k, c)| (k.clone(), c.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, FilterCondition)> for FilterExpression {
    fn from_iter<I: IntoIterator<Item = (String, FilterCondition)>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_list_and_operator_shapes() {
        assert_eq!(
            FilterCondition::from_json("file_type", &json!("code")).unwrap(),
            FilterCondition::eq("code")
        );
        assert_eq!(
            FilterCondition::from_json("language", &json!(["python", "rust"])).unwrap(),
            FilterCondition::one_of(["python", "rust"])
        );
        assert_eq!(
            FilterCondition::from_json("depth", &json!({"$lte": 2})).unwrap(),
            FilterCondition::range(RangeBounds {
                lte: Some(2.0),
                ..Default::default()
            })
        );
        assert_eq!(
            FilterCondition::from_json("has_tests", &json!({"$eq": true})).unwrap(),
            FilterCondition::eq(true)
        );
    }

    #[test]
    fn test_malformed_shapes() {
        assert!(FilterCondition::from_json("k", &json!(null)).is_err());
        assert!(FilterCondition::from_json("k", &json!({})).is_err());
        assert!(FilterCondition::from_json("k", &json!({"$like": "x"})).is_err());
        assert!(FilterCondition::from_json("k", &json!({"$gte": "high"})).is_err());
        assert!(FilterCondition::from_json("k", &json!({"$eq": 1, "$gt": 0})).is_err());
        assert!(FilterCondition::from_json("k", &json!([["nested"]])).is_err());
    }

    #[test]
    fn test_wire_form_uses_explicit_tags() {
        let expression = FilterExpression::new()
            .with("file_type", FilterCondition::eq("code"))
            .with("language", FilterCondition::one_of(["python"]))
            .with(
                "complexity_score",
                FilterCondition::range(RangeBounds {
                    gte: Some(1.0),
                    lt: Some(5.0),
                    ..Default::default()
                }),
            );
        assert_eq!(
            expression.to_json(),
            json!({
                "complexity_score": {"$gte": 1.0, "$lt": 5.0},
                "file_type": {"$eq": "code"},
                "language": {"$in": ["python"]}
            })
        );
        assert_eq!(
            FilterExpression::from_json(&expression.to_json()).unwrap(),
            expression
        );
    }

    #[test]
    fn test_check_shapes() {
        let flag = FilterCondition::eq(true);
        assert_eq!(flag.check(Some(&MetadataValue::Bool(true))), FilterCheck::Pass);
        assert_eq!(flag.check(Some(&MetadataValue::Bool(false))), FilterCheck::Fail);
        assert_eq!(flag.check(None), FilterCheck::Fail);

        let range = FilterCondition::range(RangeBounds {
            gt: Some(1.0),
            lte: Some(3.0),
            ..Default::default()
        });
        assert_eq!(range.check(Some(&MetadataValue::Int(1))), FilterCheck::Fail);
        assert_eq!(range.check(Some(&MetadataValue::Float(2.5))), FilterCheck::Pass);
        assert_eq!(range.check(Some(&MetadataValue::Int(3))), FilterCheck::Pass);
        assert!(matches!(
            range.check(Some(&MetadataValue::Text("two".into()))),
            FilterCheck::Malformed(_)
        ));

        let members = FilterCondition::one_of(["a.rs", "b.rs"]);
        assert_eq!(members.check(Some(&"b.rs".into())), FilterCheck::Pass);
        assert_eq!(members.check(Some(&"c.rs".into())), FilterCheck::Fail);
    }

    #[test]
    fn test_validate() {
        assert!(FilterCondition::In(vec![]).validate("k").is_err());
        assert!(FilterCondition::range(RangeBounds::default()).validate("k").is_err());
        assert!(FilterCondition::range(RangeBounds {
            gte: Some(f64::NAN),
            ..Default::default()
        })
        .validate("k")
        .is_err());
        assert!(FilterCondition::eq("code").validate("k").is_ok());
    }

    #[test]
    fn test_expression_matches_all_clauses() {
        let metadata = Metadata::new()
            .with("file_type", "code")
            .with("complexity_score", 4i64);
        let expression = FilterExpression::new()
            .with("file_type", FilterCondition::eq("code"))
            .with(
                "complexity_score",
                FilterCondition::range(RangeBounds {
                    gte: Some(5.0),
                    ..Default::default()
                }),
            );
        assert!(!expression.matches(&metadata));
        assert!(FilterExpression::new().matches(&metadata));
    }

    #[test]
    fn test_serde_roundtrip_through_yaml_like_value() {
        let parsed: BTreeMap<String, FilterCondition> =
            serde_json::from_value(json!({"file_type": ["code", "test"], "depth": {"$lte": 3}}))
                .unwrap();
        assert_eq!(parsed["file_type"], FilterCondition::one_of(["code", "test"]));
    }
}
