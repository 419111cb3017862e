//! # reporag-db
//!
//! Infrastructure layer for RepoRAG: the chunk model handed out by the
//! indexing pipeline, the metadata filter wire contract, and vector index
//! backends.
//!
//! ## Architecture
//!
//! ```text
//! reporag-cli → reporag-core → (traits)
//!                    ↑
//!               reporag-db (chunk model, filters, vector index backends)
//!               reporag-model (embedder and generator backends)
//! ```
//!
//! ## Modules
//!
//! - `chunk`: immutable chunks, metadata values and structural identity
//! - `filter`: `$eq/$in/$gte/$lte/$gt/$lt` filter conditions and expressions
//! - `index`: the [`VectorIndexBackend`] trait and the in-memory simple backend
//!
//! ## Usage
//!
//! ```ignore
//! use reporag_db::{SearchRequest, SearchQuery, SimpleIndex, VectorIndexBackend};
//!
//! let index = SimpleIndex::open("chunks.jsonl")?;
//! let hits = index.search(&SearchRequest::new(SearchQuery::Embedding(vec), 10))?;
//! ```

pub mod chunk;
pub mod error;
pub mod filter;
pub mod index;

pub use chunk::{Chunk, ChunkKey, Metadata, MetadataValue};
pub use error::{DbError, DbResult};
pub use filter::{FilterCheck, FilterCondition, FilterExpression, RangeBounds};
pub use index::{
    load_records, IndexCapabilities, IndexHit, IndexRecord, SearchQuery, SearchRequest,
    SimpleIndex, VectorIndexBackend, VectorMetric,
};
