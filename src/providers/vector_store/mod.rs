//! Vector index facade
//!
//! A typed interface over the vector backend: idempotent collection
//! setup, upserts keyed by deterministic uuid-string ids, and filtered
//! cosine-similarity search. The production implementation talks to
//! Qdrant; the in-memory one backs development and tests.

mod in_memory;
mod qdrant;

pub use in_memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

use crate::error::{Error, Result};
use crate::types::{Filter, IndexPoint, SearchHit};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Typed vector index operations.
///
/// Vector length must equal the store dimension on every upsert and
/// search; violations fail before any round trip. Upserts are retried on
/// transient transport errors, searches are not.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent; safe to call repeatedly
    async fn init(&self) -> Result<()>;

    /// Insert or replace one point
    async fn upsert(&self, point: IndexPoint, cancel: &CancellationToken) -> Result<()>;

    /// Insert or replace many points in one round trip
    async fn upsert_bulk(&self, points: Vec<IndexPoint>, cancel: &CancellationToken) -> Result<()>;

    /// Up to `limit` points whose payload matches every filter key,
    /// ordered by descending cosine similarity
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &Filter,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn delete_collection(&self) -> Result<()>;

    /// Remove every point whose payload matches the filter
    async fn delete_by_filter(&self, filter: &Filter) -> Result<()>;

    fn dimensions(&self) -> usize;

    fn provider_name(&self) -> &str;
}

pub(crate) fn validate_vector(dimensions: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != dimensions {
        return Err(Error::invalid_argument(format!(
            "vector dimension {} does not match store dimension {}",
            vector.len(),
            dimensions
        )));
    }
    Ok(())
}

pub(crate) fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(Error::invalid_argument("search limit must be positive"));
    }
    Ok(())
}
