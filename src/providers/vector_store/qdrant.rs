//! Qdrant-backed vector store
//!
//! Collections are created with cosine distance and the store-wide
//! dimension. Point ids are uuid strings, payloads are scalar maps, and
//! filters are equality conditions over payload keys.

use super::{validate_limit, validate_vector, VectorStore};
use crate::error::{Error, Result};
use crate::types::{Filter, IndexPoint, SearchHit};
use crate::providers::retry::{RetryError, RetryPolicy};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, points_selector::PointsSelectorOneOf, value::Kind, vectors_config,
    with_payload_selector, Condition, CreateCollection, DeleteCollection, DeletePoints, Distance,
    Filter as QdrantFilter, PointId, PointStruct, PointsSelector, ScoredPoint, SearchPoints,
    UpsertPoints, Value as QdrantValue, VectorParams, VectorsConfig, WithPayloadSelector,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl QdrantVectorStore {
    pub fn new(url: &str, collection: &str, dimensions: usize, retry: RetryPolicy) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::vector_db(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            collection: collection.to_string(),
            dimensions,
            retry,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn init(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| Error::vector_db(format!("collection lookup failed: {e}")))?;
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(CreateCollection {
                collection_name: self.collection.clone(),
                vectors_config: Some(VectorsConfig {
                    config: Some(vectors_config::Config::Params(VectorParams {
                        size: self.dimensions as u64,
                        distance: Distance::Cosine as i32,
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::vector_db(format!("collection create failed: {e}")))?;
        Ok(())
    }

    async fn upsert(&self, point: IndexPoint, cancel: &CancellationToken) -> Result<()> {
        self.upsert_bulk(vec![point], cancel).await
    }

    async fn upsert_bulk(&self, points: Vec<IndexPoint>, cancel: &CancellationToken) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        for point in &points {
            validate_vector(self.dimensions, &point.vector)?;
        }
        let structs: Vec<PointStruct> = points.iter().map(to_point_struct).collect();
        let shared = Arc::new(structs);
        self.retry
            .run(cancel, || {
                let points = shared.clone();
                async move {
                    self.client
                        .upsert_points(UpsertPoints {
                            collection_name: self.collection.clone(),
                            wait: Some(true),
                            points: points.as_ref().clone(),
                            ..Default::default()
                        })
                        .await
                        .map(|_| ())
                        .map_err(|e| {
                            RetryError::Transient(Error::vector_db(format!("upsert failed: {e}")))
                        })
                }
            })
            .await
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: &Filter,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        validate_vector(self.dimensions, vector)?;
        validate_limit(limit)?;
        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: vector.to_vec(),
            limit: limit as u64,
            filter: build_filter(filter),
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.client.search_points(request) => {
                result.map_err(|e| Error::vector_db(format!("search failed: {e}")))?
            }
        };
        Ok(response.result.into_iter().map(to_hit).collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| Error::vector_db(format!("collection list failed: {e}")))?;
        Ok(response
            .collections
            .into_iter()
            .map(|collection| collection.name)
            .collect())
    }

    async fn delete_collection(&self) -> Result<()> {
        self.client
            .delete_collection(DeleteCollection {
                collection_name: self.collection.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::vector_db(format!("collection delete failed: {e}")))?;
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &Filter) -> Result<()> {
        let Some(filter) = build_filter(filter) else {
            return Err(Error::invalid_argument("delete filter must not be empty"));
        };
        self.client
            .delete_points(DeletePoints {
                collection_name: self.collection.clone(),
                wait: Some(true),
                points: Some(PointsSelector {
                    points_selector_one_of: Some(PointsSelectorOneOf::Filter(filter)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::vector_db(format!("filtered delete failed: {e}")))?;
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "qdrant"
    }
}

fn build_filter(filter: &Filter) -> Option<QdrantFilter> {
    if filter.is_empty() {
        return None;
    }
    Some(QdrantFilter {
        must: filter
            .iter()
            .map(|(key, value)| Condition::matches(key.clone(), value.clone()))
            .collect(),
        ..Default::default()
    })
}

fn to_point_struct(point: &IndexPoint) -> PointStruct {
    let payload: HashMap<String, QdrantValue> = point
        .payload
        .to_map()
        .iter()
        .map(|(key, value)| (key.clone(), json_to_qdrant(value)))
        .collect();
    PointStruct {
        id: Some(PointId::from(point.id.clone())),
        vectors: Some(point.vector.clone().into()),
        payload,
    }
}

fn to_hit(point: ScoredPoint) -> SearchHit {
    let id = point
        .id
        .and_then(|id| id.point_id_options)
        .map(|options| match options {
            PointIdOptions::Uuid(uuid) => uuid,
            PointIdOptions::Num(num) => num.to_string(),
        })
        .unwrap_or_default();
    let payload = point
        .payload
        .iter()
        .map(|(key, value)| (key.clone(), qdrant_to_json(value)))
        .collect();
    SearchHit {
        id,
        score: point.score,
        payload,
    }
}

/// Payload scalar conversion: strings stay strings, integers stay
/// integers, floats widen to double, booleans stay booleans, anything
/// else becomes its textual representation
fn json_to_qdrant(value: &serde_json::Value) -> QdrantValue {
    let kind = match value {
        serde_json::Value::String(s) => Kind::StringValue(s.clone()),
        serde_json::Value::Bool(b) => Kind::BoolValue(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else if let Some(f) = n.as_f64() {
                Kind::DoubleValue(f)
            } else {
                Kind::StringValue(n.to_string())
            }
        }
        other => Kind::StringValue(other.to_string()),
    };
    QdrantValue { kind: Some(kind) }
}

fn qdrant_to_json(value: &QdrantValue) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => serde_json::json!(s),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(f)) => serde_json::json!(f),
        Some(Kind::BoolValue(b)) => serde_json::json!(b),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointPayload;

    #[test]
    fn payload_scalars_convert_faithfully() {
        let string = json_to_qdrant(&serde_json::json!("text"));
        assert_eq!(string.kind, Some(Kind::StringValue("text".to_string())));
        let integer = json_to_qdrant(&serde_json::json!(42));
        assert_eq!(integer.kind, Some(Kind::IntegerValue(42)));
        let double = json_to_qdrant(&serde_json::json!(1.5));
        assert_eq!(double.kind, Some(Kind::DoubleValue(1.5)));
        let boolean = json_to_qdrant(&serde_json::json!(true));
        assert_eq!(boolean.kind, Some(Kind::BoolValue(true)));
        // non-scalars fall back to their textual representation
        let other = json_to_qdrant(&serde_json::json!(["a"]));
        assert!(matches!(other.kind, Some(Kind::StringValue(_))));
    }

    #[test]
    fn qdrant_values_convert_back() {
        for value in [
            serde_json::json!("text"),
            serde_json::json!(7),
            serde_json::json!(true),
        ] {
            assert_eq!(qdrant_to_json(&json_to_qdrant(&value)), value);
        }
    }

    #[test]
    fn empty_filter_builds_to_none() {
        assert!(build_filter(&Filter::new()).is_none());
        let filter = Filter::from([("repo_name".to_string(), "demo".to_string())]);
        let built = build_filter(&filter).unwrap();
        assert_eq!(built.must.len(), 1);
    }

    #[test]
    fn point_struct_carries_uuid_id_and_payload() {
        let point = IndexPoint {
            id: "0f8fad5b-d9cb-469f-a165-70867728950e".to_string(),
            vector: vec![0.1, 0.2],
            payload: PointPayload {
                kind: "method".to_string(),
                qualified_name: "C.M".to_string(),
                parent_qualified_name: None,
                namespace: None,
                file_path: "src/a.cs".to_string(),
                start_line: 1,
                end_line: 2,
                content: "void M() {}".to_string(),
                repo_name: "demo".to_string(),
            },
        };
        let converted = to_point_struct(&point);
        assert_eq!(
            converted.id.unwrap().point_id_options,
            Some(PointIdOptions::Uuid(point.id.clone()))
        );
        assert_eq!(
            converted.payload.get("start_line").and_then(|v| v.kind.clone()),
            Some(Kind::IntegerValue(1))
        );
        assert_eq!(
            converted.payload.get("repo_name").and_then(|v| v.kind.clone()),
            Some(Kind::StringValue("demo".to_string()))
        );
        assert!(!converted.payload.contains_key("namespace"));
    }
}
