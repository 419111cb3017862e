//! Staged filtering pipeline.
//!
//! One query moves through `Init → PreFilter → VectorSearch → PostFilter →
//! Done`, each stage at most once, never backwards:
//!
//! 1. **PreFilter**: estimate the selectivity of the indexed pre-filters and
//!    admit them as a native filter only if the estimate falls inside
//!    `[selectivityMin, selectivityMax]`. There is no retry with a relaxed
//!    filter.
//! 2. **VectorSearch**: ask the index for `top_k × overfetchFactor`
//!    candidates when post-filtering is enabled, else `top_k`.
//! 3. **PostFilter**: evaluate non-indexed filters in process.
//! 4. **Done**: truncate to `top_k` and seal the [`FilterMetrics`].
//!
//! A malformed filter value never aborts the query. During pre-filtering
//! the key is dropped (non-restrictive); during post-filtering the key
//! fails. If that leaves nothing, the outcome is
//! [`RetrievalStatus::NoResults`], not an error.

mod metrics;
mod post_filter;
mod selectivity;

pub use metrics::{FilterMetrics, PreFilterDecision};
pub use post_filter::{apply_post_filter, reduction_percent, PostFilterOutcome};
pub use selectivity::{clamp_selectivity, Dimension, SelectivityTable, MAX_SELECTIVITY, MIN_SELECTIVITY};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reporag_db::{
    DbError, FilterCondition, FilterExpression, MetadataValue, RangeBounds, SearchQuery,
    SearchRequest, VectorIndexBackend,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::deadline::{run_with_deadline, DeadlineError};
use crate::errors::{RagError, RagResult};
use crate::types::ScoredCandidate;

// ============================================================================
// Filter rules
// ============================================================================

/// One configured filter value.
///
/// Parsing never fails: a value that is not a valid condition is kept as
/// `Malformed` so each stage can apply its own fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FilterRule {
    Condition(FilterCondition),
    Malformed { raw: Value, message: String },
}

impl FilterRule {
    pub fn parse(key: &str, raw: &Value) -> Self {
        match FilterCondition::from_json(key, raw) {
            Ok(condition) => Self::Condition(condition),
            Err(DbError::MalformedFilter { message, .. }) => Self::Malformed {
                raw: raw.clone(),
                message,
            },
            Err(other) => Self::Malformed {
                raw: raw.clone(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

impl From<Value> for FilterRule {
    fn from(raw: Value) -> Self {
        Self::parse("<value>", &raw)
    }
}

impl From<FilterRule> for Value {
    fn from(rule: FilterRule) -> Self {
        match rule {
            FilterRule::Condition(condition) => condition.to_json(),
            FilterRule::Malformed { raw, .. } => raw,
        }
    }
}

impl From<FilterCondition> for FilterRule {
    fn from(condition: FilterCondition) -> Self {
        Self::Condition(condition)
    }
}

/// Filters keyed by metadata key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterRule>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, condition: FilterCondition) -> Self {
        self.0.insert(key.into(), FilterRule::Condition(condition));
        self
    }

    pub fn insert_rule(&mut self, key: impl Into<String>, rule: FilterRule) {
        self.0.insert(key.into(), rule);
    }

    /// Add a condition. Two ranges on the same key merge their bounds;
    /// anything else replaces the previous rule.
    pub fn merge(&mut self, key: impl Into<String>, condition: FilterCondition) {
        let key = key.into();
        let merged = match (self.0.get(&key), condition) {
            (Some(FilterRule::Condition(FilterCondition::Range(old))), FilterCondition::Range(new)) => {
                FilterCondition::Range(RangeBounds {
                    gte: new.gte.or(old.gte),
                    lte: new.lte.or(old.lte),
                    gt: new.gt.or(old.gt),
                    lt: new.lt.or(old.lt),
                })
            }
            (_, condition) => condition,
        };
        self.0.insert(key, FilterRule::Condition(merged));
    }

    pub fn get(&self, key: &str) -> Option<&FilterRule> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterRule)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse `{key: wire-condition, ...}`. Non-object input is an error;
    /// bad values inside the object become [`FilterRule::Malformed`].
    pub fn from_json(value: &Value) -> RagResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            RagError::invalid_config(
                "filters must be a mapping of metadata key to condition",
                "Use e.g. {\"file_type\": \"code\", \"language\": [\"python\"]}",
            )
        })?;
        Ok(object
            .iter()
            .map(|(key, raw)| (key.clone(), FilterRule::parse(key, raw)))
            .collect())
    }

    /// Translate into a native index filter. Malformed or inexpressible
    /// keys are dropped with a warning.
    pub fn to_native(&self) -> FilterExpression {
        let mut expression = FilterExpression::new();
        for (key, rule) in &self.0 {
            match rule {
                FilterRule::Condition(condition) => match condition.validate(key) {
                    Ok(()) => expression.insert(key.clone(), condition.clone()),
                    Err(err) => warn!(key = %key, error = %err, "Dropping pre-filter key"),
                },
                FilterRule::Malformed { message, .. } => {
                    warn!(key = %key, message = %message, "Dropping malformed pre-filter key")
                }
            }
        }
        expression
    }
}

impl FromIterator<(String, FilterRule)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (String, FilterRule)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse a command-line filter: `key=value`, `key=a,b,c`, `key>=n`,
/// `key<=n`, `key>n` or `key<n`.
///
/// Values are read as JSON scalars where possible (`true`, `3`, `2.5`),
/// otherwise as text.
pub fn parse_filter_arg(arg: &str) -> RagResult<(String, FilterCondition)> {
    let malformed = |key: &str, message: String| RagError::MalformedFilterValue {
        key: key.to_string(),
        message,
    };

    let Some(op_start) = arg.find(['<', '>', '=']) else {
        return Err(malformed(arg, "expected key=value, key>=n, key<=n, key>n or key<n".into()));
    };
    let key = arg[..op_start].trim();
    if key.is_empty() {
        return Err(malformed(arg, "missing key".into()));
    }
    let rest = &arg[op_start..];

    let (op, value) = ["<=", ">=", "<", ">", "="]
        .iter()
        .find_map(|op| rest.strip_prefix(op).map(|v| (*op, v.trim())))
        .ok_or_else(|| malformed(key, format!("unrecognized operator in '{}'", arg)))?;

    if op == "=" {
        if value.is_empty() {
            return Err(malformed(key, "missing value".into()));
        }
        let condition = if value.contains(',') {
            FilterCondition::In(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(scalar)
                    .collect(),
            )
        } else {
            FilterCondition::Eq(scalar(value))
        };
        return Ok((key.to_string(), condition));
    }

    let bound: f64 = value
        .parse()
        .map_err(|_| malformed(key, format!("'{}' is not a number", value)))?;
    let mut bounds = RangeBounds::default();
    match op {
        "<=" => bounds.lte = Some(bound),
        ">=" => bounds.gte = Some(bound),
        "<" => bounds.lt = Some(bound),
        _ => bounds.gt = Some(bound),
    }
    Ok((key.to_string(), FilterCondition::Range(bounds)))
}

fn scalar(raw: &str) -> MetadataValue {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| MetadataValue::from_json(&v))
        .unwrap_or_else(|| MetadataValue::Text(raw.to_string()))
}

// ============================================================================
// FilterConfig
// ============================================================================

/// Filtering configuration for one query (`filter`).
///
/// Read-only once built; every query gets its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Indexed metadata filters, sent to the index when admitted.
    #[serde(default, alias = "pre_filters")]
    pub pre_filters: FilterSet,

    /// Non-indexed filters, evaluated after the search.
    #[serde(default, alias = "post_filters")]
    pub post_filters: FilterSet,

    /// Lower admission bound. Default: 0.10
    #[serde(default = "default_selectivity_min", alias = "selectivity_min")]
    pub selectivity_min: f64,

    /// Upper admission bound. Default: 0.50
    #[serde(default = "default_selectivity_max", alias = "selectivity_max")]
    pub selectivity_max: f64,

    /// Default: true
    #[serde(default = "default_true", alias = "enable_pre_filter")]
    pub enable_pre_filter: bool,

    /// Default: true. Also controls over-fetching.
    #[serde(default = "default_true", alias = "enable_post_filter")]
    pub enable_post_filter: bool,

    /// Search multiplier when post-filtering is enabled. Default: 3
    #[serde(default = "default_overfetch_factor", alias = "overfetch_factor")]
    pub overfetch_factor: usize,

    /// Recall label reported when the pre-filter was applied. Default: 0.95
    #[serde(default = "default_recall_with", alias = "recall_with_pre_filter")]
    pub recall_with_pre_filter: f64,

    /// Recall label reported otherwise. Default: 0.87
    #[serde(default = "default_recall_without", alias = "recall_without_pre_filter")]
    pub recall_without_pre_filter: f64,
}

fn default_selectivity_min() -> f64 {
    0.10
}

fn default_selectivity_max() -> f64 {
    0.50
}

fn default_true() -> bool {
    true
}

fn default_overfetch_factor() -> usize {
    3
}

fn default_recall_with() -> f64 {
    0.95
}

fn default_recall_without() -> f64 {
    0.87
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            pre_filters: FilterSet::default(),
            post_filters: FilterSet::default(),
            selectivity_min: default_selectivity_min(),
            selectivity_max: default_selectivity_max(),
            enable_pre_filter: true,
            enable_post_filter: true,
            overfetch_factor: default_overfetch_factor(),
            recall_with_pre_filter: default_recall_with(),
            recall_without_pre_filter: default_recall_without(),
        }
    }
}

impl FilterConfig {
    /// Build from a JSON mapping. Accepts camelCase and snake_case keys.
    pub fn from_json(value: &Value) -> RagResult<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            RagError::invalid_config(
                format!("invalid filter configuration: {}", e),
                "Expected {preFilters, postFilters, selectivityMin, selectivityMax, ...}",
            )
        })
    }

    pub fn with_pre_filters(mut self, filters: FilterSet) -> Self {
        self.pre_filters = filters;
        self
    }

    pub fn with_post_filters(mut self, filters: FilterSet) -> Self {
        self.post_filters = filters;
        self
    }

    /// Number of candidates to request for a final `top_k`.
    pub fn search_top_k(&self, top_k: usize) -> usize {
        if self.enable_post_filter {
            top_k.saturating_mul(self.overfetch_factor.max(1))
        } else {
            top_k
        }
    }

    /// # Errors
    /// Selectivity bounds outside `(0, 1]` or inverted, an over-fetch
    /// factor of 0, recall labels outside `[0, 1]`.
    pub fn validate(&self) -> RagResult<Vec<String>> {
        for (name, value) in [
            ("selectivityMin", self.selectivity_min),
            ("selectivityMax", self.selectivity_max),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RagError::invalid_config(
                    format!("filter.{} must be in (0, 1] (got {})", name, value),
                    "Selectivity is a fraction of the corpus, e.g. 0.10",
                ));
            }
        }
        if self.selectivity_min > self.selectivity_max {
            return Err(RagError::invalid_config(
                format!(
                    "filter.selectivityMin ({}) is greater than selectivityMax ({})",
                    self.selectivity_min, self.selectivity_max
                ),
                "Every pre-filter would be skipped; swap or widen the bounds",
            ));
        }
        if self.overfetch_factor == 0 {
            return Err(RagError::invalid_config(
                "filter.overfetchFactor cannot be 0",
                "Set overfetchFactor to at least 1 (default: 3)",
            ));
        }
        for (name, value) in [
            ("recallWithPreFilter", self.recall_with_pre_filter),
            ("recallWithoutPreFilter", self.recall_without_pre_filter),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::invalid_config(
                    format!("filter.{} must be in [0, 1] (got {})", name, value),
                    "Recall labels are fractions (defaults: 0.95 / 0.87)",
                ));
            }
        }

        let mut warnings = Vec::new();
        for (stage, filters) in [("preFilters", &self.pre_filters), ("postFilters", &self.post_filters)] {
            for (key, rule) in filters.iter() {
                if let FilterRule::Malformed { message, .. } = rule {
                    warnings.push(format!("filter.{}.{} is malformed: {}", stage, key, message));
                }
            }
        }
        if !self.enable_post_filter && !self.post_filters.is_empty() {
            warnings.push("filter.postFilters are set but enablePostFilter is false".to_string());
        }
        Ok(warnings)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Pipeline states, in the only order they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Init,
    PreFilter,
    VectorSearch,
    PostFilter,
    Done,
}

struct StageTrail(Vec<FilterStage>);

impl StageTrail {
    fn start() -> Self {
        Self(vec![FilterStage::Init])
    }

    fn enter(&mut self, stage: FilterStage) {
        debug_assert!(self.0.last().is_none_or(|last| *last < stage));
        debug!(?stage, "Entering filter stage");
        self.0.push(stage);
    }
}

/// Whether a retrieval produced candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RetrievalStatus {
    Complete,
    /// Nothing to return. Not an error.
    NoResults { reason: String },
}

/// Output of one staged retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct StagedRetrieval {
    /// Best first, scored by index similarity, at most `top_k`.
    pub candidates: Vec<ScoredCandidate>,
    pub metrics: FilterMetrics,
    pub status: RetrievalStatus,
}

/// Runs the staged pipeline against a vector index.
#[derive(Clone)]
pub struct StagedRetriever {
    index: Arc<dyn VectorIndexBackend>,
    selectivity: SelectivityTable,
    search_timeout: Option<Duration>,
}

impl std::fmt::Debug for StagedRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedRetriever")
            .field("index", &self.index.name())
            .field("search_timeout", &self.search_timeout)
            .finish()
    }
}

impl StagedRetriever {
    pub fn new(index: Arc<dyn VectorIndexBackend>) -> Self {
        Self {
            index,
            selectivity: SelectivityTable::default(),
            search_timeout: None,
        }
    }

    pub fn with_selectivity(mut self, table: SelectivityTable) -> Self {
        self.selectivity = table;
        self
    }

    pub fn with_search_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Decide whether the pre-filters are sent to the index.
    pub fn plan_pre_filter(&self, config: &FilterConfig) -> (PreFilterDecision, Option<FilterExpression>) {
        if config.pre_filters.is_empty() {
            return (PreFilterDecision::NotConfigured, None);
        }
        if !config.enable_pre_filter {
            return (PreFilterDecision::Disabled, None);
        }

        let selectivity = self.selectivity.estimate(&config.pre_filters);
        let native = config.pre_filters.to_native();
        if native.is_empty() {
            return (PreFilterDecision::NothingTranslatable { selectivity }, None);
        }
        match PreFilterDecision::admit(selectivity, config.selectivity_min, config.selectivity_max) {
            decision @ PreFilterDecision::Applied { .. } => (decision, Some(native)),
            decision => (decision, None),
        }
    }

    /// Run all stages for one query.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexUnavailable`] when the index call fails. An elapsed
    /// search deadline is reported as [`RetrievalStatus::NoResults`].
    pub fn retrieve(&self, query: SearchQuery, config: &FilterConfig, top_k: usize) -> RagResult<StagedRetrieval> {
        let top_k = top_k.max(1);
        let started = Instant::now();
        let mut trail = StageTrail::start();

        // Stage 1
        trail.enter(FilterStage::PreFilter);
        let stage_start = Instant::now();
        let (pre_filter, native_filter) = self.plan_pre_filter(config);
        match pre_filter {
            PreFilterDecision::Applied { selectivity } => {
                info!(selectivity, "Pre-filter applied")
            }
            PreFilterDecision::TooRestrictive { selectivity } => {
                info!(selectivity, "Pre-filter too restrictive, skipping")
            }
            PreFilterDecision::TooBroad { selectivity } => {
                info!(selectivity, "Pre-filter too broad, skipping")
            }
            PreFilterDecision::NothingTranslatable { selectivity } => {
                warn!(selectivity, "No pre-filter key could be translated, skipping")
            }
            PreFilterDecision::NotConfigured | PreFilterDecision::Disabled => {}
        }
        let pre_filter_latency_ms = elapsed_ms(stage_start);

        // Stage 2
        trail.enter(FilterStage::VectorSearch);
        let stage_start = Instant::now();
        let requested = config.search_top_k(top_k);
        let mut request = SearchRequest::new(query, requested);
        if let Some(filter) = native_filter {
            request = request.with_filter(filter);
        }

        let index = Arc::clone(&self.index);
        let searched = run_with_deadline("search", self.search_timeout, move || index.search(&request));
        let vector_search_latency_ms = elapsed_ms(stage_start);

        let used_pre_filter = pre_filter.is_applied();
        let pre_filter_reduction = pre_filter
            .selectivity()
            .filter(|_| used_pre_filter)
            .map(|s| (1.0 - s) * 100.0)
            .unwrap_or(0.0);
        let estimated_recall = if used_pre_filter {
            config.recall_with_pre_filter
        } else {
            config.recall_without_pre_filter
        };

        let hits = match searched {
            Ok(result) => result?,
            Err(DeadlineError::Elapsed(after)) => {
                trail.enter(FilterStage::Done);
                let metrics = FilterMetrics {
                    total_latency_ms: elapsed_ms(started),
                    pre_filter_latency_ms,
                    vector_search_latency_ms,
                    post_filter_latency_ms: 0.0,
                    pre_filter,
                    requested,
                    retrieved_count: 0,
                    post_filter_count: 0,
                    returned_count: 0,
                    pre_filter_reduction,
                    post_filter_reduction: 0.0,
                    estimated_recall,
                    used_pre_filter,
                    used_post_filter: false,
                    stages: trail.0,
                };
                return Ok(StagedRetrieval {
                    candidates: Vec::new(),
                    metrics,
                    status: RetrievalStatus::NoResults {
                        reason: format!("vector search timed out after {} ms", after.as_millis()),
                    },
                });
            }
            Err(other) => return Err(RagError::IndexUnavailable(other.to_string())),
        };

        let candidates: Vec<ScoredCandidate> = hits
            .into_iter()
            .map(|hit| ScoredCandidate::new(hit.chunk, hit.score))
            .collect();
        let retrieved_count = candidates.len();
        debug!(requested, retrieved_count, index = self.index.name(), "Vector search complete");

        // Stage 3
        trail.enter(FilterStage::PostFilter);
        let stage_start = Instant::now();
        let used_post_filter = config.enable_post_filter && !config.post_filters.is_empty();
        let (mut candidates, post_filter_reduction) = if used_post_filter {
            let outcome = apply_post_filter(candidates, &config.post_filters);
            let reduction = outcome.reduction_percent();
            info!(
                kept = outcome.kept.len(),
                reduction_pct = reduction,
                "Post-filter applied"
            );
            (outcome.kept, reduction)
        } else {
            (candidates, 0.0)
        };
        let post_filter_count = candidates.len();
        let post_filter_latency_ms = elapsed_ms(stage_start);

        // Done
        trail.enter(FilterStage::Done);
        candidates.truncate(top_k);

        let status = if !candidates.is_empty() {
            RetrievalStatus::Complete
        } else if retrieved_count == 0 {
            RetrievalStatus::NoResults {
                reason: "the index returned no candidates".to_string(),
            }
        } else {
            RetrievalStatus::NoResults {
                reason: format!("post-filter removed all {} candidates", retrieved_count),
            }
        };

        let metrics = FilterMetrics {
            total_latency_ms: elapsed_ms(started),
            pre_filter_latency_ms,
            vector_search_latency_ms,
            post_filter_latency_ms,
            pre_filter,
            requested,
            retrieved_count,
            post_filter_count,
            returned_count: candidates.len(),
            pre_filter_reduction,
            post_filter_reduction,
            estimated_recall,
            used_pre_filter,
            used_post_filter,
            stages: trail.0,
        };

        debug!(
            total_ms = metrics.total_latency_ms,
            pre_ms = metrics.pre_filter_latency_ms,
            search_ms = metrics.vector_search_latency_ms,
            post_ms = metrics.post_filter_latency_ms,
            "Staged retrieval complete"
        );

        Ok(StagedRetrieval {
            candidates,
            metrics,
            status,
        })
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
