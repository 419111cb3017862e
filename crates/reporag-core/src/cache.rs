//! Response cache.
//!
//! Keyed by the raw query text and the generator model id. Entries expire
//! after a fixed time-to-live; capacity is bounded. The cache is internally
//! synchronized and shared by every in-flight query; concurrent writes to
//! the same key keep the last one.

use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::QueryResult;
use crate::errors::{RagError, RagResult};

/// Response cache settings (`cache`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Default: true
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Time-to-live per entry, in seconds. Default: 300
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Default: 1000
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_max_entries() -> u64 {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> RagResult<Vec<String>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        if self.ttl_secs == 0 {
            return Err(RagError::invalid_config(
                "cache.ttlSecs cannot be 0 while the cache is enabled",
                "Set ttlSecs (default: 300) or disable the cache",
            ));
        }
        let mut warnings = Vec::new();
        if self.max_entries == 0 {
            warnings.push("cache.maxEntries is 0; nothing will be cached".to_string());
        }
        Ok(warnings)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    model_id: String,
}

/// TTL cache of successful query results.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Cache<CacheKey, QueryResult>,
    ttl: Duration,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_entries)
                .build(),
            ttl,
        }
    }

    /// `None` when the cache is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(Duration::from_secs(config.ttl_secs), config.max_entries))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, query: &str, model_id: &str) -> Option<QueryResult> {
        let hit = self.inner.get(&CacheKey {
            query: query.to_string(),
            model_id: model_id.to_string(),
        });
        if hit.is_some() {
            debug!(model_id, "Response cache hit");
        }
        hit
    }

    pub fn insert(&self, query: &str, model_id: &str, result: QueryResult) {
        self.inner.insert(
            CacheKey {
                query: query.to_string(),
                model_id: model_id.to_string(),
            },
            result,
        );
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
