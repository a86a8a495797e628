//! Core domain types

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Kind of semantic code unit a [`Chunk`] represents.
///
/// The set is open per supported language: C# files produce the full
/// member-level vocabulary, other languages mostly produce types and
/// functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Class,
    Interface,
    Struct,
    Record,
    Enum,
    Method,
    Constructor,
    Property,
    Field,
    Event,
    Indexer,
    Function,
}

impl ChunkKind {
    /// Stable lowercase name used in stored payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Struct => "struct",
            Self::Record => "record",
            Self::Enum => "enum",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::Property => "property",
            Self::Field => "field",
            Self::Event => "event",
            Self::Indexer => "indexer",
            Self::Function => "function",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed semantic code unit extracted from one source file.
///
/// Line numbers are 1-based and inclusive; `content` is the verbatim
/// source text covering the span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub kind: ChunkKind,
    pub qualified_name: String,
    pub parent_qualified_name: Option<String>,
    pub namespace: Option<String>,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    /// Imported module names in effect at the file, deduplicated, order
    /// preserved
    pub dependencies: Vec<String>,
    /// Space-separated modifier tokens in source order
    pub modifiers: String,
    /// Kind-specific extras (parameter list, return type, enum values, ...)
    pub attrs: BTreeMap<String, String>,
}

/// Deterministic chunk identifier.
///
/// An MD5 digest of `(file_path, start_line, end_line, qualified_name)`
/// folded into a UUID so the id is stable across re-indexing and accepted
/// by the vector backend as a uuid-string point id.
pub fn chunk_id(file_path: &str, start_line: u32, end_line: u32, qualified_name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(start_line.to_le_bytes());
    hasher.update(end_line.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(qualified_name.as_bytes());
    let digest: [u8; 16] = hasher.finalize().into();
    uuid::Uuid::from_bytes(digest).to_string()
}

/// Identifier for an oversize chunk's split piece.
///
/// Piece 0 keeps the parent id so the common single-piece case replaces
/// the same point on re-index; later pieces are re-hashed from the parent
/// id plus their ordinal, which keeps them distinguishable while staying
/// valid uuid-string ids.
pub fn piece_id(parent_id: &str, ordinal: usize) -> String {
    if ordinal == 0 {
        return parent_id.to_string();
    }
    let mut hasher = Md5::new();
    hasher.update(parent_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    let digest: [u8; 16] = hasher.finalize().into();
    uuid::Uuid::from_bytes(digest).to_string()
}

/// Typed payload stored alongside each vector.
///
/// `content` is stored so retrieval can assemble context without a second
/// fetch of the working tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub kind: String,
    pub qualified_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_qualified_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub repo_name: String,
}

impl PointPayload {
    /// Build the payload for a chunk indexed under `repo_name`
    pub fn from_chunk(chunk: &Chunk, repo_name: &str) -> Self {
        Self {
            kind: chunk.kind.as_str().to_string(),
            qualified_name: chunk.qualified_name.clone(),
            parent_qualified_name: chunk.parent_qualified_name.clone(),
            namespace: chunk.namespace.clone(),
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content.clone(),
            repo_name: repo_name.to_string(),
        }
    }

    /// Convert to the untyped key/value map used at the wire edge.
    ///
    /// Integers stay integers and strings stay strings; optional fields
    /// are omitted when absent.
    pub fn to_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind));
        map.insert(
            "qualified_name".to_string(),
            serde_json::json!(self.qualified_name),
        );
        if let Some(parent) = &self.parent_qualified_name {
            map.insert(
                "parent_qualified_name".to_string(),
                serde_json::json!(parent),
            );
        }
        if let Some(ns) = &self.namespace {
            map.insert("namespace".to_string(), serde_json::json!(ns));
        }
        map.insert("file_path".to_string(), serde_json::json!(self.file_path));
        map.insert("start_line".to_string(), serde_json::json!(self.start_line));
        map.insert("end_line".to_string(), serde_json::json!(self.end_line));
        map.insert("content".to_string(), serde_json::json!(self.content));
        map.insert("repo_name".to_string(), serde_json::json!(self.repo_name));
        map
    }

    /// Rebuild a typed payload from the wire map, if the required keys are
    /// present
    pub fn from_map(map: &HashMap<String, serde_json::Value>) -> Option<Self> {
        let str_of = |key: &str| map.get(key).and_then(|v| v.as_str()).map(String::from);
        let int_of = |key: &str| map.get(key).and_then(|v| v.as_u64()).map(|v| v as u32);
        Some(Self {
            kind: str_of("kind")?,
            qualified_name: str_of("qualified_name")?,
            parent_qualified_name: str_of("parent_qualified_name"),
            namespace: str_of("namespace"),
            file_path: str_of("file_path")?,
            start_line: int_of("start_line")?,
            end_line: int_of("end_line")?,
            content: str_of("content")?,
            repo_name: str_of("repo_name")?,
        })
    }
}

/// A stored vector with its payload
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Equality predicate over payload keys applied during similarity search
pub type Filter = HashMap<String, String>;

/// One similarity-search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Live progress of an indexing job.
///
/// Counters are monotonically non-decreasing within a single job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total_files: usize,
    pub processed_files: usize,
    pub total_chunks: usize,
    pub current_file: String,
    pub errors: Vec<String>,
}

/// Final accounting of an indexing job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub files_processed: usize,
    pub chunks_indexed: usize,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

/// A file/line citation attached to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub score: f32,
}

/// Answer to a natural-language question, with citations ordered by
/// descending score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub references: Vec<Reference>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let a = chunk_id("src/a.cs", 3, 10, "N.C");
        let b = chunk_id("src/a.cs", 3, 10, "N.C");
        assert_eq!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn chunk_id_varies_with_identity() {
        let base = chunk_id("src/a.cs", 3, 10, "N.C");
        assert_ne!(base, chunk_id("src/b.cs", 3, 10, "N.C"));
        assert_ne!(base, chunk_id("src/a.cs", 4, 10, "N.C"));
        assert_ne!(base, chunk_id("src/a.cs", 3, 11, "N.C"));
        assert_ne!(base, chunk_id("src/a.cs", 3, 10, "N.D"));
    }

    #[test]
    fn piece_zero_keeps_parent_id() {
        let parent = chunk_id("src/a.cs", 1, 2, "C.M");
        assert_eq!(piece_id(&parent, 0), parent);
        let one = piece_id(&parent, 1);
        assert_ne!(one, parent);
        assert_ne!(one, piece_id(&parent, 2));
        assert!(uuid::Uuid::parse_str(&one).is_ok());
    }

    #[test]
    fn payload_round_trips_through_map() {
        let payload = PointPayload {
            kind: "method".to_string(),
            qualified_name: "C.M".to_string(),
            parent_qualified_name: Some("N.C".to_string()),
            namespace: Some("N".to_string()),
            file_path: "src/a.cs".to_string(),
            start_line: 3,
            end_line: 9,
            content: "public void M() {}".to_string(),
            repo_name: "demo".to_string(),
        };
        let map = payload.to_map();
        assert_eq!(map["start_line"], serde_json::json!(3));
        assert_eq!(PointPayload::from_map(&map), Some(payload));
    }

    #[test]
    fn payload_map_omits_absent_options() {
        let payload = PointPayload {
            kind: "class".to_string(),
            qualified_name: "Top".to_string(),
            parent_qualified_name: None,
            namespace: None,
            file_path: "src/a.cs".to_string(),
            start_line: 1,
            end_line: 1,
            content: "class Top {}".to_string(),
            repo_name: "demo".to_string(),
        };
        let map = payload.to_map();
        assert!(!map.contains_key("parent_qualified_name"));
        assert!(!map.contains_key("namespace"));
        assert_eq!(PointPayload::from_map(&map), Some(payload));
    }

    #[test]
    fn from_map_requires_core_keys() {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!("class"));
        assert!(PointPayload::from_map(&map).is_none());
    }
}
