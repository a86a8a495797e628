//! repo-rag — natural-language questions over code repositories
//!
//! Repositories are cloned, decomposed into semantic chunks, embedded
//! and stored in a vector index; questions retrieve similar chunks for
//! the repository and a chat model answers with file/line citations.

pub mod chunking;
pub mod config;
pub mod error;
pub mod indexer;
pub mod providers;
pub mod query;
pub mod registry;
pub mod repo;
pub mod server;
pub mod text;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, ChunkKind, Progress, QueryResult, Reference, Summary};
