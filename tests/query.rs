//! Query behavior against an empty or foreign index
//!
//! Run with: cargo test --test query

use repo_rag::providers::chat::MockChatProvider;
use repo_rag::providers::embedding::MockEmbeddingProvider;
use repo_rag::providers::vector_store::{InMemoryVectorStore, VectorStore};
use repo_rag::query::{QueryEngine, NO_CONTEXT_ANSWER};
use repo_rag::types::{IndexPoint, PointPayload};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DIMS: usize = 16;

async fn engine_with_store() -> (QueryEngine, Arc<InMemoryVectorStore>, Arc<MockChatProvider>) {
    let store = Arc::new(InMemoryVectorStore::new("query", DIMS));
    store.init().await.unwrap();
    let chat = Arc::new(MockChatProvider::new("It parses files."));
    let engine = QueryEngine::new(
        Arc::new(MockEmbeddingProvider::new(DIMS)),
        store.clone(),
        chat.clone(),
    );
    (engine, store, chat)
}

fn stored_point(embedder: &MockEmbeddingProvider, repo: &str, path: &str) -> IndexPoint {
    IndexPoint {
        id: uuid::Uuid::new_v4().to_string(),
        vector: embedder.vector_for("stored text"),
        payload: PointPayload {
            kind: "method".to_string(),
            qualified_name: "Parser.Parse".to_string(),
            parent_qualified_name: Some("App.Parser".to_string()),
            namespace: Some("App".to_string()),
            file_path: path.to_string(),
            start_line: 10,
            end_line: 24,
            content: "public void Parse() {}".to_string(),
            repo_name: repo.to_string(),
        },
    }
}

#[tokio::test]
async fn empty_index_yields_the_no_context_answer() {
    let (engine, _store, chat) = engine_with_store().await;
    let cancel = CancellationToken::new();
    let result = engine
        .ask("what does the parser do?", "demo", 5, &cancel)
        .await
        .unwrap();
    assert_eq!(result.answer, NO_CONTEXT_ANSWER);
    assert!(result.references.is_empty());
    assert!(chat.last_messages().is_none());
}

#[tokio::test]
async fn repository_filter_isolates_repositories() {
    let (engine, store, _chat) = engine_with_store().await;
    let embedder = MockEmbeddingProvider::new(DIMS);
    let cancel = CancellationToken::new();
    store
        .upsert(stored_point(&embedder, "other-repo", "src/Parser.cs"), &cancel)
        .await
        .unwrap();

    // the only indexed point belongs to a different repository
    let result = engine
        .ask("what does the parser do?", "demo", 5, &cancel)
        .await
        .unwrap();
    assert_eq!(result.answer, NO_CONTEXT_ANSWER);
    assert!(result.references.is_empty());

    // asking the owning repository finds it
    let result = engine
        .ask("what does the parser do?", "other-repo", 5, &cancel)
        .await
        .unwrap();
    assert_eq!(result.answer, "It parses files.");
    assert_eq!(result.references.len(), 1);
    assert_eq!(result.references[0].file_path, "src/Parser.cs");
    assert_eq!(result.references[0].start_line, 10);
    assert_eq!(result.references[0].end_line, 24);
}
