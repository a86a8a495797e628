//! In-memory vector store for development and tests

use super::{validate_limit, validate_vector, VectorStore};
use crate::error::{Error, Result};
use crate::types::{Filter, IndexPoint, SearchHit};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// DashMap-backed store with brute-force cosine search
pub struct InMemoryVectorStore {
    collection: String,
    dimensions: usize,
    collections: DashMap<String, Vec<IndexPoint>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: &str, dimensions: usize) -> Self {
        Self {
            collection: collection.to_string(),
            dimensions,
            collections: DashMap::new(),
        }
    }

    /// Number of points currently stored in the collection
    pub fn len(&self) -> usize {
        self.collections
            .get(&self.collection)
            .map(|points| points.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn init(&self) -> Result<()> {
        self.collections
            .entry(self.collection.clone())
            .or_default();
        Ok(())
    }

    async fn upsert(&self, point: IndexPoint, _cancel: &CancellationToken) -> Result<()> {
        validate_vector(self.dimensions, &point.vector)?;
        let mut points = self
            .collections
            .get_mut(&self.collection)
            .ok_or_else(|| Error::vector_db(format!("collection '{}' not found", self.collection)))?;
        match points.iter_mut().find(|existing| existing.id == point.id) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
        Ok(())
    }

    async fn upsert_bulk(&self, points: Vec<IndexPoint>, cancel: &CancellationToken) -> Result<()> {
        for point in points {
            self.upsert(point, cancel).await?;
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &Filter,
        _cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        validate_vector(self.dimensions, vector)?;
        validate_limit(limit)?;
        let points = self
            .collections
            .get(&self.collection)
            .ok_or_else(|| Error::vector_db(format!("collection '{}' not found", self.collection)))?;

        let mut hits: Vec<SearchHit> = points
            .iter()
            .filter(|point| payload_matches(point, filter))
            .map(|point| SearchHit {
                id: point.id.clone(),
                score: cosine_similarity(vector, &point.vector),
                payload: point.payload.to_map(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete_collection(&self) -> Result<()> {
        self.collections.remove(&self.collection);
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &Filter) -> Result<()> {
        if let Some(mut points) = self.collections.get_mut(&self.collection) {
            points.retain(|point| !payload_matches(point, filter));
        }
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "in-memory"
    }
}

fn payload_matches(point: &IndexPoint, filter: &Filter) -> bool {
    let payload = point.payload.to_map();
    filter.iter().all(|(key, expected)| {
        payload.get(key).is_some_and(|value| match value {
            serde_json::Value::String(s) => s == expected,
            serde_json::Value::Number(n) => &n.to_string() == expected,
            serde_json::Value::Bool(b) => &b.to_string() == expected,
            _ => false,
        })
    })
}

/// Cosine similarity normalized into `[0, 1]`
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b) + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointPayload;
    use std::collections::HashMap;

    fn point(id: &str, vector: Vec<f32>, repo: &str, path: &str) -> IndexPoint {
        IndexPoint {
            id: id.to_string(),
            vector,
            payload: PointPayload {
                kind: "method".to_string(),
                qualified_name: "C.M".to_string(),
                parent_qualified_name: None,
                namespace: None,
                file_path: path.to_string(),
                start_line: 1,
                end_line: 2,
                content: "fn m() {}".to_string(),
                repo_name: repo.to_string(),
            },
        }
    }

    fn repo_filter(repo: &str) -> Filter {
        HashMap::from([("repo_name".to_string(), repo.to_string())])
    }

    #[tokio::test]
    async fn upserted_point_is_retrievable_with_matching_filter() {
        let store = InMemoryVectorStore::new("test", 3);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        let vector = vec![0.5, 0.1, -0.2];
        store
            .upsert(point("p1", vector.clone(), "demo", "src/a.rs"), &cancel)
            .await
            .unwrap();
        store
            .upsert(point("p2", vec![-0.9, 0.3, 0.0], "other", "src/b.rs"), &cancel)
            .await
            .unwrap();

        let hits = store
            .search(&vector, 5, &repo_filter("demo"), &cancel)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new("test", 2);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        store
            .upsert(point("p1", vec![1.0, 0.0], "demo", "src/a.rs"), &cancel)
            .await
            .unwrap();
        store
            .upsert(point("p1", vec![0.0, 1.0], "demo", "src/a.rs"), &cancel)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn hits_are_ordered_by_descending_score() {
        let store = InMemoryVectorStore::new("test", 2);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        store
            .upsert(point("near", vec![1.0, 0.05], "demo", "src/a.rs"), &cancel)
            .await
            .unwrap();
        store
            .upsert(point("far", vec![-1.0, 0.2], "demo", "src/b.rs"), &cancel)
            .await
            .unwrap();
        let hits = store
            .search(&[1.0, 0.0], 2, &repo_filter("demo"), &cancel)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn zero_limit_is_invalid() {
        let store = InMemoryVectorStore::new("test", 2);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        let result = store.search(&[1.0, 0.0], 0, &Filter::new(), &cancel).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::new("test", 3);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        let result = store
            .upsert(point("p1", vec![1.0, 0.0], "demo", "src/a.rs"), &cancel)
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
        let result = store.search(&[1.0], 5, &Filter::new(), &cancel).await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn unmatched_filter_yields_empty_hits() {
        let store = InMemoryVectorStore::new("test", 2);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        store
            .upsert(point("p1", vec![1.0, 0.0], "demo", "src/a.rs"), &cancel)
            .await
            .unwrap();
        let hits = store
            .search(&[1.0, 0.0], 5, &repo_filter("missing"), &cancel)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_by_filter_purges_a_repo() {
        let store = InMemoryVectorStore::new("test", 2);
        store.init().await.unwrap();
        let cancel = CancellationToken::new();
        store
            .upsert(point("p1", vec![1.0, 0.0], "demo", "src/a.rs"), &cancel)
            .await
            .unwrap();
        store
            .upsert(point("p2", vec![0.0, 1.0], "keep", "src/b.rs"), &cancel)
            .await
            .unwrap();
        store.delete_by_filter(&repo_filter("demo")).await.unwrap();
        assert_eq!(store.len(), 1);
        let hits = store
            .search(&[0.0, 1.0], 5, &repo_filter("keep"), &cancel)
            .await
            .unwrap();
        assert_eq!(hits[0].id, "p2");
    }
}
