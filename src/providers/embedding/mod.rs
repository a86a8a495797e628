//! Embedding generation over an external model

mod mock;
mod openai;

pub use mock::MockEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Largest batch a caller may submit in one call
pub const BATCH_SIZE: usize = 100;

/// Semantic embedding interface.
///
/// Implementations return one vector per input text, in submission
/// order, each of [`dimensions`](Self::dimensions) length. Callers are
/// responsible for batching; a provider never slices further.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    fn provider_name(&self) -> &str;
}
