//! `linkrag search` and `linkrag context`.
//!
//! Both commands decode a payload source, build its index in memory and run
//! one query against it. Nothing is cached between invocations.

use anyhow::Result;
use serde::Serialize;

use crate::share::load_payload;
use linkrag_core::context::{format_retrieved_context, MAX_CONTEXT_CHARS};
use linkrag_core::models::{TOP_K_MAX, TOP_K_MIN};
use linkrag_core::search::retrieve_top_k;
use linkrag_core::{build_index, Payload, RetrievedChunk};

const EXCERPT_CHARS: usize = 160;

/// Ranked chunks plus the context block they assemble into.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub results: Vec<RetrievedChunk>,
    pub context: String,
}

/// Run `query` against `payload`.
///
/// `top_k` overrides the payload's own setting and is clamped to the same
/// range; `max_chars` bounds the assembled context.
pub fn query_payload(
    payload: &Payload,
    query: &str,
    top_k: Option<usize>,
    max_chars: usize,
) -> QueryOutcome {
    let index = build_index(payload);
    let top_k = top_k
        .map(|k| k.clamp(TOP_K_MIN, TOP_K_MAX))
        .unwrap_or(index.top_k());
    let results = retrieve_top_k(&index, query, top_k);
    let context = format_retrieved_context(&results, max_chars);
    QueryOutcome { results, context }
}

pub fn run_search(source: &str, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let payload = load_payload(source)?;
    let outcome = query_payload(&payload, query, top_k, MAX_CONTEXT_CHARS);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.results)?);
        return Ok(());
    }

    if outcome.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in outcome.results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, result.score, result.doc_title);
        println!("    chunk: {}", result.chunk_id);
        println!("    excerpt: \"{}\"", excerpt(&result.content));
        println!();
    }
    Ok(())
}

pub fn run_context(source: &str, query: &str, max_chars: usize) -> Result<()> {
    let payload = load_payload(source)?;
    let outcome = query_payload(&payload, query, None, max_chars);
    if !outcome.context.is_empty() {
        println!("{}", outcome.context);
    }
    Ok(())
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let head: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", head.trim_end())
}
