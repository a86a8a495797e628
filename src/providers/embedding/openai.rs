//! OpenAI-compatible embedding provider
//!
//! Two endpoint shapes are supported and auto-selected from the URL
//! host: managed deployments (an `azure.com` host, `api-key` header,
//! deployment-scoped path) and direct endpoints (bearer token,
//! `/embeddings` path). Both speak the same request/response body.

use super::{EmbeddingProvider, BATCH_SIZE};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::retry::{RetryError, RetryPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const MANAGED_API_VERSION: &str = "2024-02-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointShape {
    Managed,
    Direct,
}

fn endpoint_shape(endpoint: &str) -> EndpointShape {
    let host = reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(String::from))
        .unwrap_or_default();
    if host == "azure.com" || host.ends_with(".azure.com") {
        EndpointShape::Managed
    } else {
        EndpointShape::Direct
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Batched embedding client with retry and backoff
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            retry,
        }
    }

    fn embeddings_url(&self) -> String {
        match endpoint_shape(&self.endpoint) {
            EndpointShape::Managed => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                self.endpoint, self.model, MANAGED_API_VERSION
            ),
            EndpointShape::Direct => format!("{}/embeddings", self.endpoint),
        }
    }

    async fn attempt(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, RetryError> {
        let payload = serde_json::json!({
            "input": texts,
            "model": self.model,
            "encoding_format": "float",
        });
        let mut request = self.client.post(self.embeddings_url()).json(&payload);
        request = match endpoint_shape(&self.endpoint) {
            EndpointShape::Managed => request.header("api-key", &self.api_key),
            EndpointShape::Direct => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await.map_err(|e| {
            // connection-level failures are worth another attempt
            RetryError::Transient(Error::embedding(format!("request failed: {e}")))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Error::embedding(format!("backend returned {status}: {body}"));
            return Err(if is_transient_status(status.as_u16()) {
                RetryError::Transient(err)
            } else {
                RetryError::Fatal(err)
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetryError::Fatal(Error::embedding(format!("malformed response: {e}"))))?;

        if parsed.data.len() != texts.len() {
            return Err(RetryError::Fatal(Error::embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            ))));
        }
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(RetryError::Fatal(Error::embedding(format!(
                    "expected dimension {}, got {}",
                    self.dimensions,
                    vector.len()
                ))));
            }
        }
        Ok(vectors)
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > BATCH_SIZE {
            return Err(Error::invalid_argument(format!(
                "batch of {} exceeds the {} limit",
                texts.len(),
                BATCH_SIZE
            )));
        }
        self.retry.run(cancel, || self.attempt(texts)).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
