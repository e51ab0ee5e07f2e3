//! In-memory inverted statistics over a payload's chunks.
//!
//! An [`Index`] is built once per payload and never mutated afterwards. When
//! the payload changes, a new index replaces the old one wholesale; there is
//! no incremental update path. Because it is immutable, an index can be
//! shared behind an `Arc` and queried from any number of threads.
//!
//! # IDF
//!
//! For `N` chunks and a term appearing in `df` of them:
//!
//! ```text
//! idf(t) = ln(1 + (N - df + 0.5) / (df + 0.5))
//! ```
//!
//! This is the standard BM25 IDF. It approaches zero for terms present in
//! nearly every chunk.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::chunk::split_into_chunks;
use crate::models::{Chunk, Payload};
use crate::tokenize::tokenize;

/// Read-only retrieval index for one payload.
#[derive(Debug, Clone)]
pub struct Index {
    chunks: Vec<Chunk>,
    top_k: usize,
    avg_chunk_length: f64,
    idf_by_token: HashMap<String, f64>,
}

impl Index {
    /// Chunks in insertion order: document order, then ordinal.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Default result limit taken from the payload's retrieval config.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Mean chunk token count, or `1.0` for an empty index.
    pub fn avg_chunk_length(&self) -> f64 {
        self.avg_chunk_length
    }

    /// IDF for `term`, or `None` if no chunk contains it.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf_by_token.get(term).copied()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Chunk, tokenize and index every document in `payload`.
///
/// Chunk ids are `{doc_id}#{ordinal}` with ordinals starting at 0 for each
/// document. Running this twice on the same payload yields identical chunk
/// ids, boundaries and token counts.
pub fn build_index(payload: &Payload) -> Index {
    let retrieval = payload.retrieval;
    let mut chunks = Vec::new();

    for doc in &payload.docs {
        let parts = split_into_chunks(&doc.content, retrieval.chunk_size, retrieval.overlap);
        for (ordinal, part) in parts.into_iter().enumerate() {
            chunks.push(make_chunk(&doc.id, &doc.title, ordinal, part));
        }
    }

    let idf_by_token = compute_idf(&chunks);
    let avg_chunk_length = if chunks.is_empty() {
        1.0
    } else {
        chunks.iter().map(|c| c.token_count).sum::<usize>() as f64 / chunks.len() as f64
    };

    debug!(
        docs = payload.docs.len(),
        chunks = chunks.len(),
        terms = idf_by_token.len(),
        avg_chunk_length,
        "built retrieval index"
    );

    Index {
        chunks,
        top_k: retrieval.top_k,
        avg_chunk_length,
        idf_by_token,
    }
}

fn make_chunk(doc_id: &str, doc_title: &str, ordinal: usize, content: String) -> Chunk {
    let tokens = tokenize(&content);
    let mut term_frequency: HashMap<String, u32> = HashMap::new();
    for token in &tokens {
        *term_frequency.entry(token.clone()).or_insert(0) += 1;
    }

    Chunk {
        chunk_id: format!("{}#{}", doc_id, ordinal),
        doc_id: doc_id.to_string(),
        doc_title: doc_title.to_string(),
        content,
        token_count: tokens.len(),
        tokens,
        term_frequency,
    }
}

fn compute_idf(chunks: &[Chunk]) -> HashMap<String, f64> {
    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for chunk in chunks {
        let unique: HashSet<&str> = chunk.tokens.iter().map(String::as_str).collect();
        for term in unique {
            *document_frequency.entry(term).or_insert(0) += 1;
        }
    }

    let n = chunks.len() as f64;
    document_frequency
        .into_iter()
        .map(|(term, df)| {
            let df = df as f64;
            (term.to_string(), (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
        })
        .collect()
}
