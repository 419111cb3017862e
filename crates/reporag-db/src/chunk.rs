//! Chunk model shared by the index backends and the retrieval core.
//!
//! Chunks are produced by the external ingestion pipeline and treated as
//! immutable values here. Retrieval stages never mutate a chunk; they pair
//! clones of it with stage-local scores.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Well-known metadata keys
// ============================================================================

/// Source file path of the chunk.
pub const KEY_FILE_PATH: &str = "file_path";
/// First line of the chunk in its source file.
pub const KEY_START_LINE: &str = "start_line";
/// Last line of the chunk in its source file.
pub const KEY_END_LINE: &str = "end_line";
/// Coarse category, e.g. `code` or `docs`.
pub const KEY_FILE_CATEGORY: &str = "file_category";

// ============================================================================
// MetadataValue
// ============================================================================

/// A scalar metadata value.
///
/// Deserialized untagged, so JSON `true`, `3`, `2.5` and `"rust"` map to
/// `Bool`, `Int`, `Float` and `Text` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Numeric view of the value. Booleans and text are not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Non-negative integral view, used for line numbers.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(i) if *i >= 0 => Some(*i as u64),
            Self::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Equality used by filters: numbers compare by value across `Int` and
    /// `Float`, everything else must match variant and value.
    pub fn matches(&self, other: &MetadataValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Convert a JSON scalar. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert back to a JSON scalar.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Mapping of metadata keys to scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Source file path, if recorded.
    pub fn file_path(&self) -> Option<&str> {
        self.get(KEY_FILE_PATH).and_then(MetadataValue::as_str)
    }

    pub fn start_line(&self) -> Option<u64> {
        self.get(KEY_START_LINE).and_then(MetadataValue::as_u64)
    }

    pub fn end_line(&self) -> Option<u64> {
        self.get(KEY_END_LINE).and_then(MetadataValue::as_u64)
    }

    /// Coarse category (`code`, `docs`, ...).
    pub fn category(&self) -> Option<&str> {
        self.get(KEY_FILE_CATEGORY).and_then(MetadataValue::as_str)
    }

    /// Build metadata from a JSON object, skipping null and nested values.
    pub fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut metadata = Self::new();
        for (key, value) in map {
            match MetadataValue::from_json(value) {
                Some(v) => metadata.insert(key.clone(), v),
                None => debug!("Skipping non-scalar metadata key '{}'", key),
            }
        }
        metadata
    }
}

impl FromIterator<(String, MetadataValue)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// A unit of indexed text with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier assigned by the indexer, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Raw chunk text.
    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Structural identity of this chunk.
    ///
    /// Two chunks with the same source file and line span are the same
    /// logical chunk, even when they arrive as distinct values from
    /// different retrieval paths. Chunks without a position fall back to
    /// the indexer id, then to a content fingerprint.
    pub fn key(&self) -> ChunkKey {
        if let (Some(path), Some(start)) = (self.metadata.file_path(), self.metadata.start_line())
        {
            return ChunkKey::Position {
                path: path.to_string(),
                start,
                end: self.metadata.end_line(),
            };
        }
        if let Some(id) = &self.id {
            return ChunkKey::Id(id.clone());
        }
        let mut hasher = DefaultHasher::new();
        self.metadata.file_path().hash(&mut hasher);
        self.text.hash(&mut hasher);
        ChunkKey::Content(hasher.finish())
    }

    /// Human-readable line span: `"s-e"`, `"s"`, or `"N/A"`.
    pub fn line_span(&self) -> String {
        match (self.metadata.start_line(), self.metadata.end_line()) {
            (Some(s), Some(e)) => format!("{}-{}", s, e),
            (Some(s), None) => s.to_string(),
            _ => "N/A".to_string(),
        }
    }
}

/// Structural identity used for deduplication and rank fusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChunkKey {
    Position {
        path: String,
        start: u64,
        end: Option<u64>,
    },
    Id(String),
    Content(u64),
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position {
                path,
                start,
                end: Some(end),
            } => write!(f, "{}:{}-{}", path, start, end),
            Self::Position { path, start, .. } => write!(f, "{}:{}", path, start),
            Self::Id(id) => write!(f, "id:{}", id),
            Self::Content(hash) => write!(f, "content:{:016x}", hash),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn positioned(text: &str, path: &str, start: i64, end: i64) -> Chunk {
        Chunk::new(
            text,
            Metadata::new()
                .with(KEY_FILE_PATH, path)
                .with(KEY_START_LINE, start)
                .with(KEY_END_LINE, end),
        )
    }

    #[test]
    fn test_same_position_same_key() {
        let a = positioned("fn a() {}", "src/lib.rs", 10, 20);
        let b = positioned("fn a() {}", "src/lib.rs", 10, 20).with_id("other-instance");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_falls_back_to_id_then_content() {
        let with_id = Chunk::new("text", Metadata::new()).with_id("c-1");
        assert_eq!(with_id.key(), ChunkKey::Id("c-1".to_string()));

        let a = Chunk::new("same text", Metadata::new());
        let b = Chunk::new("same text", Metadata::new());
        let c = Chunk::new("other text", Metadata::new());
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_line_span() {
        assert_eq!(positioned("x", "a.rs", 3, 9).line_span(), "3-9");
        let start_only = Chunk::new("x", Metadata::new().with(KEY_START_LINE, 4i64));
        assert_eq!(start_only.line_span(), "4");
        assert_eq!(Chunk::new("x", Metadata::new()).line_span(), "N/A");
    }

    #[test]
    fn test_metadata_value_untagged_deserialize() {
        let values: Vec<MetadataValue> =
            serde_json::from_str(r#"[true, 3, 2.5, "rust"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                MetadataValue::Bool(true),
                MetadataValue::Int(3),
                MetadataValue::Float(2.5),
                MetadataValue::Text("rust".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_match_across_variants() {
        assert!(MetadataValue::Int(5).matches(&MetadataValue::Float(5.0)));
        assert!(!MetadataValue::Int(5).matches(&MetadataValue::Text("5".into())));
        assert!(!MetadataValue::Bool(true).matches(&MetadataValue::Int(1)));
    }

    #[test]
    fn test_from_json_map_skips_nested() {
        let map = serde_json::json!({
            "file_path": "src/main.rs",
            "start_line": 1,
            "tags": ["a", "b"],
            "owner": null
        });
        let metadata = Metadata::from_json_map(map.as_object().unwrap());
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.file_path(), Some("src/main.rs"));
        assert_eq!(metadata.start_line(), Some(1));
    }
}
