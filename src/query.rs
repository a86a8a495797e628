//! Question answering over an indexed repository
//!
//! The RAG cycle: embed the question, search the vector store filtered
//! by repository, assemble the retrieved chunks into a bounded context,
//! and ask the chat backend for an answer with file/line citations.

use crate::error::{Error, Result};
use crate::providers::chat::{ChatMessage, ChatProvider};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::vector_store::VectorStore;
use crate::types::{Filter, QueryResult, Reference, SearchHit};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Returned when the repository has no matching indexed content
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant context was found for this repository. Make sure it has been indexed.";

/// Returned when a downstream backend fails after validation
const FALLBACK_ANSWER: &str =
    "Sorry, I could not produce an answer for this question right now. Please try again.";

const SYSTEM_PROMPT: &str = "You are an expert code assistant. Answer using only the provided \
     code context. Cite the file paths and line numbers you rely on. If the context is not \
     sufficient to answer, say so plainly.";

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatProvider>,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
        }
    }

    /// Answer a question about one repository.
    ///
    /// Invalid arguments are surfaced to the caller and cancellation
    /// propagates unwrapped; any other downstream failure produces a
    /// best-effort result with a generic apology and no references.
    pub async fn ask(
        &self,
        question: &str,
        repo_name: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<QueryResult> {
        if question.trim().is_empty() {
            return Err(Error::invalid_argument("question must not be blank"));
        }
        if repo_name.trim().is_empty() {
            return Err(Error::invalid_argument("repository name must not be blank"));
        }
        if max_results == 0 {
            return Err(Error::invalid_argument("max_results must be positive"));
        }

        let started = Instant::now();
        let mut result = match self.answer(question, repo_name, max_results, cancel).await {
            Ok(result) => result,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::error!(repo = repo_name, error = %e, "query failed, returning fallback");
                QueryResult {
                    answer: FALLBACK_ANSWER.to_string(),
                    references: Vec::new(),
                    duration_ms: 0,
                }
            }
        };
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn answer(
        &self,
        question: &str,
        repo_name: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> Result<QueryResult> {
        let vectors = self
            .embedder
            .embed_batch(&[question.to_string()], cancel)
            .await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("no embedding returned for the question"))?;

        let filter = Filter::from([("repo_name".to_string(), repo_name.to_string())]);
        let hits = self
            .store
            .search(&query_vector, max_results, &filter, cancel)
            .await?;
        if hits.is_empty() {
            return Ok(QueryResult {
                answer: NO_CONTEXT_ANSWER.to_string(),
                references: Vec::new(),
                duration_ms: 0,
            });
        }

        let context = assemble_context(&hits);
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("Context:\n{context}\n\nQuestion: {question}")),
        ];
        let answer = match self.chat.complete(&messages, cancel).await {
            Ok(answer) => answer,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::error!(repo = repo_name, error = %e, "chat backend failed");
                return Ok(QueryResult {
                    answer: FALLBACK_ANSWER.to_string(),
                    references: Vec::new(),
                    duration_ms: 0,
                });
            }
        };

        Ok(QueryResult {
            answer,
            references: extract_references(&hits),
            duration_ms: 0,
        })
    }
}

/// One block per hit carrying the location header and verbatim chunk
/// content, joined with separators
fn assemble_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .filter_map(|hit| {
            let file_path = hit.payload.get("file_path")?.as_str()?;
            let start_line = hit.payload.get("start_line")?.as_u64()?;
            let end_line = hit.payload.get("end_line")?.as_u64()?;
            let content = hit.payload.get("content")?.as_str()?;
            Some(format!(
                "File: {file_path} (lines {start_line}-{end_line})\n{content}\n"
            ))
        })
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

/// Citations from hits that carry the required payload keys, ordered by
/// descending score
fn extract_references(hits: &[SearchHit]) -> Vec<Reference> {
    let mut references: Vec<Reference> = hits
        .iter()
        .filter_map(|hit| {
            Some(Reference {
                file_path: hit.payload.get("file_path")?.as_str()?.to_string(),
                start_line: hit.payload.get("start_line")?.as_u64()? as u32,
                end_line: hit.payload.get("end_line")?.as_u64()? as u32,
                score: hit.score,
            })
        })
        .collect();
    references.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    references
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::chat::MockChatProvider;
    use crate::providers::embedding::MockEmbeddingProvider;
    use crate::types::IndexPoint;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Returns a canned hit list for every search
    struct StubStore {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl VectorStore for StubStore {
        async fn init(&self) -> Result<()> {
            Ok(())
        }
        async fn upsert(&self, _point: IndexPoint, _cancel: &CancellationToken) -> Result<()> {
            Ok(())
        }
        async fn upsert_bulk(
            &self,
            _points: Vec<IndexPoint>,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            Ok(())
        }
        async fn search(
            &self,
            _vector: &[f32],
            _limit: usize,
            _filter: &Filter,
            _cancel: &CancellationToken,
        ) -> Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }
        async fn list_collections(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_collection(&self) -> Result<()> {
            Ok(())
        }
        async fn delete_by_filter(&self, _filter: &Filter) -> Result<()> {
            Ok(())
        }
        fn dimensions(&self) -> usize {
            8
        }
        fn provider_name(&self) -> &str {
            "stub"
        }
    }

    fn hit(id: &str, score: f32, path: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            score,
            payload: HashMap::from([
                ("file_path".to_string(), serde_json::json!(path)),
                ("start_line".to_string(), serde_json::json!(3)),
                ("end_line".to_string(), serde_json::json!(9)),
                ("content".to_string(), serde_json::json!("void M() {}")),
                ("repo_name".to_string(), serde_json::json!("demo")),
            ]),
        }
    }

    fn engine_with(
        hits: Vec<SearchHit>,
        chat: MockChatProvider,
    ) -> (QueryEngine, Arc<MockChatProvider>) {
        let chat = Arc::new(chat);
        let engine = QueryEngine::new(
            Arc::new(MockEmbeddingProvider::new(8)),
            Arc::new(StubStore { hits }),
            chat.clone(),
        );
        (engine, chat)
    }

    #[tokio::test]
    async fn answers_with_ordered_references() {
        let hits = vec![hit("a", 0.9, "src/a.cs"), hit("b", 0.7, "src/b.cs")];
        let (engine, chat) = engine_with(hits, MockChatProvider::new("OK"));
        let cancel = CancellationToken::new();

        let result = engine
            .ask("what does M do?", "demo", 5, &cancel)
            .await
            .unwrap();
        assert_eq!(result.answer, "OK");
        let scores: Vec<f32> = result.references.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
        assert_eq!(result.references[0].file_path, "src/a.cs");

        // the chat turn carries the assembled context and the question
        let messages = chat.last_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[1].content.contains("File: src/a.cs (lines 3-9)"));
        assert!(messages[1].content.contains("\n---\n\n"));
        assert!(messages[1].content.contains("what does M do?"));
    }

    #[tokio::test]
    async fn empty_hits_yield_no_context_answer() {
        let (engine, chat) = engine_with(Vec::new(), MockChatProvider::new("unused"));
        let cancel = CancellationToken::new();
        let result = engine.ask("anything?", "demo", 5, &cancel).await.unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.references.is_empty());
        // the chat backend is never consulted
        assert!(chat.last_messages().is_none());
    }

    #[tokio::test]
    async fn chat_failure_becomes_a_graceful_answer() {
        let hits = vec![hit("a", 0.9, "src/a.cs")];
        let (engine, _chat) = engine_with(hits, MockChatProvider::failing());
        let cancel = CancellationToken::new();
        let result = engine.ask("anything?", "demo", 5, &cancel).await.unwrap();
        assert_eq!(result.answer, FALLBACK_ANSWER);
        assert!(result.references.is_empty());
    }

    #[tokio::test]
    async fn hits_without_required_keys_are_dropped_from_references() {
        let mut partial = hit("a", 0.8, "src/a.cs");
        partial.payload.remove("start_line");
        let hits = vec![partial, hit("b", 0.6, "src/b.cs")];
        let (engine, _chat) = engine_with(hits, MockChatProvider::new("OK"));
        let cancel = CancellationToken::new();
        let result = engine.ask("anything?", "demo", 5, &cancel).await.unwrap();
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].file_path, "src/b.cs");
    }

    #[tokio::test]
    async fn blank_arguments_are_invalid() {
        let (engine, _chat) = engine_with(Vec::new(), MockChatProvider::new("OK"));
        let cancel = CancellationToken::new();
        for (question, repo) in [("", "demo"), ("  ", "demo"), ("q", ""), ("q", "   ")] {
            let result = engine.ask(question, repo, 5, &cancel).await;
            assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        }
        let result = engine.ask("q", "demo", 0, &cancel).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn cancellation_propagates_unwrapped() {
        let (engine, _chat) = engine_with(Vec::new(), MockChatProvider::new("OK"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine.ask("q", "demo", 5, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
