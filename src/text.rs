//! Searchable-text assembly and token-safe splitting
//!
//! Embedding backends enforce a token ceiling per input. Token counts are
//! estimated as `characters / chars_per_token`; oversize texts are split
//! by lines first, then sentences, then hard character boundaries.

use crate::config::IndexingConfig;
use crate::types::Chunk;

/// Prepares a chunk's text for embedding, splitting when the estimate
/// exceeds the token budget
#[derive(Debug, Clone)]
pub struct TextPreparer {
    max_tokens: usize,
    chars_per_token: usize,
}

impl TextPreparer {
    pub fn new(max_tokens: usize, chars_per_token: usize) -> Self {
        Self {
            max_tokens,
            chars_per_token,
        }
    }

    pub fn from_config(config: &IndexingConfig) -> Self {
        Self::new(config.max_tokens, config.chars_per_token)
    }

    /// Character budget equivalent to the token budget
    fn budget(&self) -> usize {
        self.max_tokens * self.chars_per_token
    }

    /// Estimated token count for a text
    pub fn estimated_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(self.chars_per_token)
    }

    /// Assemble the searchable text for a chunk and split it into
    /// token-safe pieces.
    ///
    /// The assembled text is `qualified_name`, `namespace` (when present)
    /// and `content` joined by newlines; empty parts are omitted. Every
    /// returned piece fits the token budget.
    pub fn prepare(&self, chunk: &Chunk) -> Vec<String> {
        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if !chunk.qualified_name.is_empty() {
            parts.push(&chunk.qualified_name);
        }
        if let Some(ns) = chunk.namespace.as_deref() {
            if !ns.is_empty() {
                parts.push(ns);
            }
        }
        if !chunk.content.is_empty() {
            parts.push(&chunk.content);
        }
        let text = parts.join("\n");
        if text.len() <= self.budget() {
            return vec![text];
        }
        self.split_text(&text)
    }

    /// Greedily pack lines into budget-sized pieces; oversize lines fall
    /// through to sentence and character splitting
    fn split_text(&self, text: &str) -> Vec<String> {
        let budget = self.budget();
        let mut pieces = Vec::new();
        let mut current = String::new();
        for line in text.split('\n') {
            if line.len() > budget {
                flush(&mut current, &mut pieces);
                split_oversize_line(line, budget, &mut pieces);
                continue;
            }
            let separator = usize::from(!current.is_empty());
            if current.len() + separator + line.len() > budget {
                flush(&mut current, &mut pieces);
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
        flush(&mut current, &mut pieces);
        pieces
    }
}

fn flush(current: &mut String, pieces: &mut Vec<String>) {
    if !current.trim().is_empty() {
        pieces.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Split a single line that exceeds the budget on sentence terminators,
/// packing greedily; sentences that still exceed it are split at
/// character boundaries
fn split_oversize_line(line: &str, budget: usize, pieces: &mut Vec<String>) {
    let mut current = String::new();
    for sentence in line.split_inclusive(['.', '!', '?']) {
        if sentence.len() > budget {
            flush(&mut current, pieces);
            hard_split(sentence, budget, pieces);
            continue;
        }
        if current.len() + sentence.len() > budget {
            flush(&mut current, pieces);
        }
        current.push_str(sentence);
    }
    flush(&mut current, pieces);
}

/// Last resort: cut at character boundaries within the budget
fn hard_split(text: &str, budget: usize, pieces: &mut Vec<String>) {
    let mut current = String::new();
    for ch in text.chars() {
        if current.len() + ch.len_utf8() > budget {
            flush(&mut current, pieces);
        }
        current.push(ch);
    }
    flush(&mut current, pieces);
}
