//! Grounding-context assembly.
//!
//! Renders ranked chunks as numbered blocks:
//!
//! ```text
//! [1] Deployment Guide
//! Roll back by re-tagging the previous image...
//!
//! [2] Incident Notes
//! ...
//! ```
//!
//! The whole block list is bounded by a character budget. Blocks are added
//! in rank order until the next one would not fit; a block is never cut in
//! half. Raising the budget only ever appends blocks.

use crate::models::RetrievedChunk;

/// Default context budget, in characters.
pub const MAX_CONTEXT_CHARS: usize = 12_000;

/// Longest body a single block may carry, in characters.
pub const MAX_CHUNK_CHARS: usize = 2_200;

const TRUNCATION_MARKER: &str = "\n...[truncated]";
const BLOCK_SEPARATOR: &str = "\n\n";

/// Join ranked chunks into one context string of at most `max_chars`
/// characters.
pub fn format_retrieved_context(chunks: &[RetrievedChunk], max_chars: usize) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut parts: Vec<String> = Vec::new();
    let mut total = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        let body = truncate_text(&chunk.content, MAX_CHUNK_CHARS);
        let block = format!("[{}] {}\n{}", i + 1, chunk.doc_title, body);

        // Every block is charged for a separator, so the joined string
        // (one separator fewer) always stays inside the budget.
        let next_total = total + block.chars().count() + separator_len;
        if next_total > max_chars {
            break;
        }

        parts.push(block);
        total = next_total;
    }

    parts.join(BLOCK_SEPARATOR)
}

/// Cut `input` to fit `max_chars`, ending with a truncation marker.
fn truncate_text(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let keep = max_chars.saturating_sub(16).max(32);
    let head: String = input.chars().take(keep).collect();
    format!("{}{}", head.trim_end(), TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: format!("{}#0", title),
            doc_title: title.to_string(),
            content: content.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(format_retrieved_context(&[], MAX_CONTEXT_CHARS), "");
    }

    #[test]
    fn test_numbered_blocks() {
        let out = format_retrieved_context(
            &[chunk("Guide", "step one"), chunk("Notes", "step two")],
            MAX_CONTEXT_CHARS,
        );
        assert_eq!(out, "[1] Guide\nstep one\n\n[2] Notes\nstep two");
    }

    #[test]
    fn test_long_chunk_truncated() {
        let long = "z".repeat(5000);
        let out = format_retrieved_context(&[chunk("Big", &long)], MAX_CONTEXT_CHARS);
        assert!(out.ends_with("...[truncated]"));
        let body = out.strip_prefix("[1] Big\n").unwrap();
        assert!(body.chars().count() <= MAX_CHUNK_CHARS);
    }

    #[test]
    fn test_budget_drops_whole_blocks() {
        let chunks = vec![chunk("A", &"a".repeat(100)), chunk("B", &"b".repeat(100))];
        // first block: "[1] A\n" + 100 = 106 chars, charged 108
        let out = format_retrieved_context(&chunks, 150);
        assert_eq!(out, format!("[1] A\n{}", "a".repeat(100)));

        let none = format_retrieved_context(&chunks, 50);
        assert_eq!(none, "");
    }

    #[test]
    fn test_budget_is_monotonic() {
        let chunks: Vec<RetrievedChunk> = (0..6)
            .map(|i| chunk(&format!("Doc{}", i), &"word ".repeat(40 * (i + 1))))
            .collect();
        let mut previous = String::new();
        for budget in (0..3000).step_by(97) {
            let out = format_retrieved_context(&chunks, budget);
            assert!(out.chars().count() <= budget);
            assert!(out.starts_with(&previous));
            previous = out;
        }
    }
}
