//! repo-rag entry point

use repo_rag::config::AppConfig;
use repo_rag::indexer::Indexer;
use repo_rag::providers::chat::{ChatProvider, OpenAiChatProvider};
use repo_rag::providers::embedding::{EmbeddingProvider, OpenAiEmbeddingProvider};
use repo_rag::providers::retry::RetryPolicy;
use repo_rag::providers::vector_store::{QdrantVectorStore, VectorStore};
use repo_rag::query::QueryEngine;
use repo_rag::registry::JobRegistry;
use repo_rag::repo::{GitFetcher, RepoFetcher};
use repo_rag::server::{self, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load()?;
    let retry = RetryPolicy::from_config(&config.indexing);

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(OpenAiEmbeddingProvider::new(&config.embedding, retry.clone()));
    let store: Arc<dyn VectorStore> = Arc::new(QdrantVectorStore::new(
        &config.vector_store_url(),
        &config.vector_store.collection,
        config.embedding.dimensions,
        retry,
    )?);
    store.init().await?;
    let chat: Arc<dyn ChatProvider> = Arc::new(OpenAiChatProvider::new(
        config.chat_endpoint(),
        config.chat_api_key(),
        &config.chat.model,
    ));
    let fetcher: Arc<dyn RepoFetcher> = Arc::new(GitFetcher::new(config.storage.path.clone()));

    let indexer = Arc::new(Indexer::new(
        fetcher,
        embedder.clone(),
        store.clone(),
        &config.indexing,
    ));
    let registry = Arc::new(JobRegistry::new(indexer, store.clone()));
    let query = Arc::new(QueryEngine::new(embedder, store, chat));

    server::serve(
        AppState { registry, query },
        &config.server.host,
        config.server.port,
    )
    .await?;
    Ok(())
}
