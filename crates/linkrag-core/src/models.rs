//! Core data models shared by the codec and the retrieval engine.
//!
//! [`Payload`] is the canonical, versioned corpus description. It serializes
//! to the stable wire shape:
//!
//! ```json
//! { "v": 1, "title": "...", "systemPrompt": "...",
//!   "docs": [{ "id": "...", "title": "...", "content": "..." }],
//!   "retrieval": { "topK": 4, "chunkSize": 800, "overlap": 120 } }
//! ```
//!
//! [`Chunk`] and [`RetrievedChunk`] are derived from a payload and thrown
//! away whenever the payload changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The only payload version this build reads and writes.
pub const PAYLOAD_VERSION: u32 = 1;

/// Allowed range for [`RetrievalConfig::top_k`].
pub const TOP_K_MIN: usize = 1;
pub const TOP_K_MAX: usize = 12;

/// Allowed range for [`RetrievalConfig::chunk_size`], in characters.
pub const CHUNK_SIZE_MIN: usize = 200;
pub const CHUNK_SIZE_MAX: usize = 4000;

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_OVERLAP: usize = 120;

/// A reference document. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Retrieval tuning carried inside the payload.
///
/// Invariants (enforced by normalization, never by rejection):
/// `top_k ∈ [1, 12]`, `chunk_size ∈ [200, 4000]`,
/// `overlap ∈ [0, chunk_size / 2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl RetrievalConfig {
    /// Clamp every field into its legal range, `overlap` last so it
    /// respects the already-clamped chunk size.
    pub fn clamped(top_k: usize, chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.clamp(CHUNK_SIZE_MIN, CHUNK_SIZE_MAX);
        Self {
            top_k: top_k.clamp(TOP_K_MIN, TOP_K_MAX),
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// The corpus plus configuration that travels inside a share link.
///
/// Payloads are never mutated in place; normalization produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub v: u32,
    pub title: String,
    pub system_prompt: String,
    pub docs: Vec<Document>,
    pub retrieval: RetrievalConfig,
}

/// One indexed window of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `{doc_id}#{ordinal}`, unique within an index.
    pub chunk_id: String,
    pub doc_id: String,
    pub doc_title: String,
    pub content: String,
    pub tokens: Vec<String>,
    pub term_frequency: HashMap<String, u32>,
    pub token_count: usize,
}

/// A ranked chunk returned for a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub doc_title: String,
    pub content: String,
    pub score: f64,
}
