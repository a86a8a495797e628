//! Deterministic in-process embedding provider for development and tests

use super::{EmbeddingProvider, BATCH_SIZE};
use crate::error::{Error, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Embeds texts with a stable hash-derived vector: identical texts map
/// to identical vectors, so similarity search behaves predictably.
pub struct MockEmbeddingProvider {
    dimensions: usize,
    batches: AtomicUsize,
    fail_after: Option<usize>,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            batches: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    /// Succeed for `batches` calls, then fail every call after
    pub fn failing_after(dimensions: usize, batches: usize) -> Self {
        Self {
            dimensions,
            batches: AtomicUsize::new(0),
            fail_after: Some(batches),
        }
    }

    /// Number of batches embedded so far
    pub fn batches_seen(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// The vector this provider assigns to a text
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Md5::digest(text.as_bytes());
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()] as f32;
                let wave = ((i / digest.len()) as f32 + 1.0) * 0.37;
                (byte / 255.0 - 0.5) * wave.cos() + 0.01
            })
            .collect();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if texts.len() > BATCH_SIZE {
            return Err(Error::invalid_argument(format!(
                "batch of {} exceeds the {} limit",
                texts.len(),
                BATCH_SIZE
            )));
        }
        let seen = self.batches.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if seen >= limit {
                return Err(Error::embedding("mock embedding failure"));
            }
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_parallels_input() {
        let provider = MockEmbeddingProvider::new(8);
        let cancel = CancellationToken::new();
        let texts = vec!["one".to_string(), "two".to_string(), "one".to_string()];
        let vectors = provider.embed_batch(&texts, &cancel).await.unwrap();
        assert_eq!(vectors.len(), 3);
        for vector in &vectors {
            assert_eq!(vector.len(), 8);
        }
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn failure_mode_kicks_in_after_threshold() {
        let provider = MockEmbeddingProvider::failing_after(4, 1);
        let cancel = CancellationToken::new();
        let texts = vec!["a".to_string()];
        assert!(provider.embed_batch(&texts, &cancel).await.is_ok());
        assert!(provider.embed_batch(&texts, &cancel).await.is_err());
        assert_eq!(provider.batches_seen(), 2);
    }
}
