//! Indexing pipeline
//!
//! Straight-line orchestration: fetch the repository, enumerate code
//! files, chunk and prepare texts per file, then embed and upsert the
//! accumulated pairs in fixed-size slices. Upserts within a slice fan
//! out concurrently; slices themselves run sequentially so the
//! embedding backend sees bounded pressure.

use crate::chunking::Chunker;
use crate::config::IndexingConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::vector_store::VectorStore;
use crate::repo::RepoFetcher;
use crate::text::TextPreparer;
use crate::types::{piece_id, Chunk, IndexPoint, PointPayload, Progress, Summary};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Concurrent upserts within one embed batch
const UPSERT_CONCURRENCY: usize = 8;

pub struct Indexer {
    fetcher: Arc<dyn RepoFetcher>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    preparer: TextPreparer,
    embed_batch: usize,
    progress_interval: usize,
}

impl Indexer {
    pub fn new(
        fetcher: Arc<dyn RepoFetcher>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: &IndexingConfig,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            store,
            chunker: Chunker::new(),
            preparer: TextPreparer::from_config(config),
            embed_batch: config.embed_batch.max(1),
            progress_interval: config.progress_interval.max(1),
        }
    }

    /// Index one repository end to end, reporting progress snapshots on
    /// the given channel.
    ///
    /// A file that fails to parse or read is recorded in the progress
    /// errors and still counts as processed; a failed embed or upsert
    /// batch aborts the job with the batch's starting index recorded.
    /// Cancellation is honored at file boundaries and between batches.
    pub async fn index(
        &self,
        url: &str,
        repo_name: &str,
        progress: &watch::Sender<Progress>,
        cancel: &CancellationToken,
    ) -> Result<Summary> {
        let started = Instant::now();
        let mut state = Progress::default();

        let local = self.fetcher.fetch(url, repo_name, cancel).await?;
        progress.send_replace(state.clone());

        let files = self.fetcher.list_code_files(&local)?;
        state.total_files = files.len();
        progress.send_replace(state.clone());
        tracing::info!(repo = repo_name, files = files.len(), "repository fetched");

        let mut pending: Vec<(String, Chunk, String)> = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            state.current_file = file.clone();
            match self.fetcher.read(&local, file).await {
                Ok(content) => match self.chunker.parse(file, &content) {
                    Ok(chunks) => {
                        state.total_chunks += chunks.len();
                        for chunk in chunks {
                            for (ordinal, text) in
                                self.preparer.prepare(&chunk).into_iter().enumerate()
                            {
                                pending.push((piece_id(&chunk.id, ordinal), chunk.clone(), text));
                            }
                        }
                    }
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => state.errors.push(format!("{file}: {e}")),
                },
                Err(e) => state.errors.push(format!("{file}: {e}")),
            }
            state.processed_files += 1;
            if (i + 1) % self.progress_interval == 0 || i + 1 == files.len() {
                progress.send_replace(state.clone());
            }
        }

        let mut indexed = 0usize;
        for (batch_index, slice) in pending.chunks(self.embed_batch).enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let start_index = batch_index * self.embed_batch;
            let texts: Vec<String> = slice.iter().map(|(_, _, text)| text.clone()).collect();
            let vectors = match self.embedder.embed_batch(&texts, cancel).await {
                Ok(vectors) => vectors,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    state.errors.push(format!("batch starting at {start_index}: {e}"));
                    progress.send_replace(state.clone());
                    return Err(e);
                }
            };

            let points: Vec<IndexPoint> = slice
                .iter()
                .zip(vectors)
                .map(|((id, chunk, _), vector)| IndexPoint {
                    id: id.clone(),
                    vector,
                    payload: PointPayload::from_chunk(chunk, repo_name),
                })
                .collect();

            let mut upserts = stream::iter(points.into_iter().map(|point| {
                let store = self.store.clone();
                async move { store.upsert(point, cancel).await }
            }))
            .buffer_unordered(UPSERT_CONCURRENCY);

            while let Some(result) = upserts.next().await {
                match result {
                    Ok(()) => indexed += 1,
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        state.errors.push(format!("batch starting at {start_index}: {e}"));
                        progress.send_replace(state.clone());
                        return Err(e);
                    }
                }
            }
        }

        progress.send_replace(state.clone());
        tracing::info!(
            repo = repo_name,
            files = state.processed_files,
            points = indexed,
            "indexing finished"
        );
        Ok(Summary {
            files_processed: state.processed_files,
            chunks_indexed: indexed,
            duration_ms: started.elapsed().as_millis() as u64,
            errors: state.errors,
        })
    }
}
