//! Vector index module for reporag-db.
//!
//! The retrieval core talks to the vector store only through
//! [`VectorIndexBackend`]. The store itself is a black box: it receives a
//! query, a requested count and an optional native filter expression, and
//! answers with a ranked list of chunks.
//!
//! ## Available Backends
//!
//! - [`SimpleIndex`]: in-memory brute-force index loaded from JSONL, for
//!   tests and small repositories

mod simple;
mod traits;

pub use simple::{load_records, IndexRecord, SimpleIndex};
pub use traits::{
    IndexCapabilities, IndexHit, SearchQuery, SearchRequest, VectorIndexBackend, VectorMetric,
};
