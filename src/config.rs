//! Configuration management
//!
//! Sources, in priority order: environment variables (prefix `REPO_RAG_`),
//! a TOML configuration file, built-in defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default embedding dimension (OpenAI text-embedding-3-small)
pub const DEFAULT_VECTOR_DIM: usize = 1536;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub vector_store: VectorStoreConfig,
    pub indexing: IndexingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Where repository clones live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./repositories"),
        }
    }
}

/// Embedding backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Endpoint base URL; an `azure.com` host selects the managed shape
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Store-wide vector dimension, must match the backend collection
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimensions: DEFAULT_VECTOR_DIM,
        }
    }
}

/// Chat backend settings; endpoint and key are shared with the embedding
/// backend unless overridden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Vector backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6334,
            collection: "code-chunks".to_string(),
        }
    }
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Token safety budget per embedded text
    pub max_tokens: usize,
    /// Characters-per-token estimator constant
    pub chars_per_token: usize,
    /// Embedding + upsert slice size
    pub embed_batch: usize,
    /// Files between progress snapshots
    pub progress_interval: usize,
    /// Retry count for embedding calls and upserts
    pub max_retries: u32,
    /// Backoff base delay in milliseconds
    pub base_delay_ms: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 6000,
            chars_per_token: 3,
            embed_batch: 50,
            progress_interval: 10,
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

impl AppConfig {
    /// Load configuration: TOML file (if present) merged with environment
    /// overrides.
    ///
    /// The file path comes from `REPO_RAG_CONFIG`, falling back to
    /// `./repo-rag.toml`.
    pub fn load() -> Result<Self> {
        let path = env::var("REPO_RAG_CONFIG").unwrap_or_else(|_| "repo-rag.toml".to_string());
        let mut config = if std::path::Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)
                .map_err(|e| Error::config(format!("failed to parse {}: {}", path, e)))?
        } else {
            Self::default()
        };
        config.merge_environment();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `REPO_RAG_*` environment variables
    pub fn merge_environment(&mut self) {
        if let Ok(host) = env::var("REPO_RAG_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("REPO_RAG_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = env::var("REPO_RAG_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(endpoint) = env::var("REPO_RAG_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
        if let Ok(key) = env::var("REPO_RAG_API_KEY") {
            self.embedding.api_key = key;
        }
        if let Ok(model) = env::var("REPO_RAG_EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(dim) = env::var("REPO_RAG_VECTOR_DIM") {
            if let Ok(dim) = dim.parse() {
                self.embedding.dimensions = dim;
            }
        }
        if let Ok(model) = env::var("REPO_RAG_CHAT_MODEL") {
            self.chat.model = model;
        }
        if let Ok(host) = env::var("REPO_RAG_VECTOR_HOST") {
            self.vector_store.host = host;
        }
        if let Ok(port) = env::var("REPO_RAG_VECTOR_PORT") {
            if let Ok(port) = port.parse() {
                self.vector_store.port = port;
            }
        }
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(Error::config("vector dimension must be positive"));
        }
        if self.indexing.chars_per_token == 0 || self.indexing.max_tokens == 0 {
            return Err(Error::config("token estimator constants must be positive"));
        }
        if self.indexing.embed_batch == 0 {
            return Err(Error::config("embed batch size must be positive"));
        }
        Ok(())
    }

    /// Endpoint the chat backend should use
    pub fn chat_endpoint(&self) -> &str {
        self.chat
            .endpoint
            .as_deref()
            .unwrap_or(&self.embedding.endpoint)
    }

    /// API key the chat backend should use
    pub fn chat_api_key(&self) -> &str {
        self.chat
            .api_key
            .as_deref()
            .unwrap_or(&self.embedding.api_key)
    }

    /// Vector backend URL
    pub fn vector_store_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.vector_store.host, self.vector_store.port
        )
    }
}
