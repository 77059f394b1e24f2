//! Domain types shared by the indexing, retrieval and chat crates.

use serde::{Deserialize, Serialize};

/// Pointer from an index row back to the chunk it was built from.
///
/// - `source_path`: the document key, exactly as the loader produced it
/// - `ordinal`: 0-based position among that document's chunks
///
/// The chunk text itself is never stored; it is re-derived by chunking the
/// source again with the same configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRef {
    pub source_path: String,
    pub ordinal: usize,
}

impl ChunkRef {
    pub fn new(source_path: impl Into<String>, ordinal: usize) -> Self {
        Self { source_path: source_path.into(), ordinal }
    }
}

/// A single nearest-neighbour result from the vector index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub row: usize,
    /// Squared L2 distance; lower is closer.
    pub distance: f32,
}

/// A retrieved chunk with its provenance, ordered by rank by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub source_path: String,
    pub ordinal: usize,
    pub distance: f32,
    pub text: String,
}

/// Options passed to a language-model backend for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: usize,
    /// Parallelism hint for CPU backends.
    pub threads: usize,
    /// Output is truncated at the first occurrence of any of these.
    pub stop: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { max_tokens: 256, threads: 1, stop: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
