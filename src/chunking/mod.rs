//! Language-aware semantic chunking
//!
//! Source files are decomposed into typed chunks by walking a
//! tree-sitter syntax tree. C# gets a fully semantic walk (namespaces,
//! nested types, one chunk per member); other supported languages use
//! rule-driven extraction over their declaration node kinds. Files in
//! languages without a registered grammar yield no chunks.

mod csharp;
mod rules;

use crate::error::{Error, Result};
use crate::types::Chunk;
use std::path::Path;
use tree_sitter::Node;

/// Diagnostics logged per file before giving up on reporting more
const MAX_SYNTAX_DIAGNOSTICS: usize = 10;

/// Parses source files into semantic chunks
#[derive(Debug, Default, Clone)]
pub struct Chunker;

impl Chunker {
    pub fn new() -> Self {
        Self
    }

    /// Parse one file into chunks.
    ///
    /// Syntax errors never abort parsing: whatever the partial tree
    /// admits is returned and diagnostics are logged. An error is
    /// returned only when the parser produces no tree at all.
    pub fn parse(&self, file_path: &str, content: &str) -> Result<Vec<Chunk>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "cs" => csharp::parse(file_path, content),
            other => match rules::rules_for_extension(other) {
                Some(lang_rules) => rules::parse(lang_rules, file_path, content),
                None => Ok(Vec::new()),
            },
        }
    }
}

/// Run tree-sitter over a file, failing only on total parser failure
pub(crate) fn parse_tree(
    language: &tree_sitter::Language,
    file_path: &str,
    content: &str,
) -> Result<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|e| Error::internal(format!("failed to set parser language: {e}")))?;
    parser
        .parse(content, None)
        .ok_or_else(|| Error::parse(file_path, "parser produced no syntax tree"))
}

/// Log up to [`MAX_SYNTAX_DIAGNOSTICS`] error/missing nodes for a file
pub(crate) fn log_syntax_errors(file_path: &str, root: Node<'_>) {
    if !root.has_error() {
        return;
    }
    let mut reported = 0usize;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if reported >= MAX_SYNTAX_DIAGNOSTICS {
            break;
        }
        if node.is_error() || node.is_missing() {
            tracing::warn!(
                file = file_path,
                line = node.start_position().row + 1,
                column = node.start_position().column + 1,
                "syntax error, chunking continues on the partial tree"
            );
            reported += 1;
            continue;
        }
        if node.has_error() {
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }
}

/// Verbatim source text for a node
pub(crate) fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// 1-based inclusive line span of a node
pub(crate) fn node_lines(node: Node<'_>) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

/// Declared name of a node: the `name` field when the grammar provides
/// one, otherwise the first identifier child
pub(crate) fn name_text(node: Node<'_>, source: &str) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return Some(node_text(name, source).to_string());
    }
    let mut cursor = node.walk();
    let result = node
        .named_children(&mut cursor)
        .find(|child| child.kind().ends_with("identifier"))
        .map(|child| node_text(child, source).to_string());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_no_chunks() {
        let chunker = Chunker::new();
        assert_eq!(chunker.parse("src/Empty.cs", "").unwrap(), Vec::new());
        assert_eq!(chunker.parse("src/Empty.cs", "   \n\t\n").unwrap(), Vec::new());
    }

    #[test]
    fn unknown_extension_yields_no_chunks() {
        let chunker = Chunker::new();
        let chunks = chunker.parse("notes.txt", "just some prose").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn extension_dispatch_is_case_insensitive() {
        let chunker = Chunker::new();
        let chunks = chunker
            .parse("src/Widget.CS", "public class Widget {}")
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].qualified_name, "Widget");
    }
}
