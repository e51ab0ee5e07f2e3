//! BM25 ranking over an [`Index`].
//!
//! # Scoring
//!
//! For each chunk and each distinct query term `t` the chunk contains:
//!
//! ```text
//! score += idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len)) * qf(t)
//! ```
//!
//! with `k1 = 1.2`, `b = 0.75`, `tf` the term's count in the chunk, `len` the
//! chunk's token count and `qf(t)` the term's count in the query. A coverage
//! bonus of `0.15 * matched / distinct` then favours chunks that match more
//! of the query vocabulary.
//!
//! Chunks with a final score `<= 0` are dropped. The rest are sorted by
//! score, descending, with a stable sort so that ties keep index order.

use std::collections::HashMap;

use crate::index::Index;
use crate::models::RetrievedChunk;
use crate::tokenize::tokenize;

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.2;
/// BM25 length normalization.
pub const BM25_B: f64 = 0.75;
/// Weight of the matched-vocabulary fraction added to every score.
pub const COVERAGE_BONUS: f64 = 0.15;

/// Rank chunks for `query`, returning at most `index.top_k()` results.
pub fn retrieve_top_chunks(index: &Index, query: &str) -> Vec<RetrievedChunk> {
    retrieve_top_k(index, query, index.top_k())
}

/// Rank chunks for `query`, returning at most `top_k` results.
///
/// Never fails: an empty query, a query made only of stopwords or
/// punctuation, or an empty index all give an empty vector.
pub fn retrieve_top_k(index: &Index, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
    let query_terms = query_term_frequencies(query);
    if query_terms.is_empty() || index.is_empty() {
        return Vec::new();
    }

    let avg_len = index.avg_chunk_length();
    let distinct = query_terms.len() as f64;

    let mut scored: Vec<(usize, f64)> = Vec::new();
    for (position, chunk) in index.chunks().iter().enumerate() {
        let length_norm = 1.0 - BM25_B + BM25_B * chunk.token_count as f64 / avg_len;
        let mut score = 0.0;
        let mut matched = 0usize;

        for (term, query_freq) in &query_terms {
            let Some(&tf) = chunk.term_frequency.get(term) else {
                continue;
            };
            let idf = index.idf(term).unwrap_or(0.0);
            let tf = tf as f64;
            score += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * length_norm)
                * *query_freq as f64;
            matched += 1;
        }

        if matched == 0 {
            continue;
        }
        score += COVERAGE_BONUS * (matched as f64 / distinct);

        if score > 0.0 {
            scored.push((position, score));
        }
    }

    // `sort_by` is stable: equal scores keep insertion order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(position, score)| {
            let chunk = &index.chunks()[position];
            RetrievedChunk {
                chunk_id: chunk.chunk_id.clone(),
                doc_title: chunk.doc_title.clone(),
                content: chunk.content.clone(),
                score,
            }
        })
        .collect()
}

/// Distinct query terms in first-occurrence order, with their counts.
fn query_term_frequencies(query: &str) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for term in tokenize(query) {
        match positions.get(&term) {
            Some(&i) => order[i].1 += 1,
            None => {
                positions.insert(term.clone(), order.len());
                order.push((term, 1));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::models::{Document, Payload, RetrievalConfig, PAYLOAD_VERSION};

    fn index_of(docs: &[(&str, &str)], top_k: usize) -> Index {
        build_index(&Payload {
            v: PAYLOAD_VERSION,
            title: "t".to_string(),
            system_prompt: String::new(),
            docs: docs
                .iter()
                .map(|(id, content)| Document {
                    id: id.to_string(),
                    title: id.to_uppercase(),
                    content: content.to_string(),
                })
                .collect(),
            retrieval: RetrievalConfig {
                top_k,
                chunk_size: 800,
                overlap: 120,
            },
        })
    }

    #[test]
    fn test_repeated_terms_rank_higher() {
        let index = index_of(
            &[
                ("runbook", "deploy rollback procedure. deploy rollback procedure. deploy rollback procedure."),
                ("notes", "rollback"),
            ],
            4,
        );
        let results = retrieve_top_chunks(&index, "rollback procedure");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "runbook#0");
        assert_eq!(results[1].chunk_id, "notes#0");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_empty_query() {
        let index = index_of(&[("a", "something relevant")], 4);
        assert!(retrieve_top_chunks(&index, "").is_empty());
        assert!(retrieve_top_chunks(&index, "?!... --").is_empty());
        assert!(retrieve_top_chunks(&index, "the and of").is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = index_of(&[], 4);
        assert!(retrieve_top_chunks(&index, "anything").is_empty());
    }

    #[test]
    fn test_non_matching_chunks_excluded() {
        let index = index_of(&[("a", "postgres vacuum"), ("b", "redis eviction")], 4);
        let results = retrieve_top_chunks(&index, "redis");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_title, "B");
    }

    #[test]
    fn test_truncates_to_top_k() {
        let docs: Vec<(String, String)> = (0..10)
            .map(|i| (format!("d{}", i), format!("shared term {}", i)))
            .collect();
        let refs: Vec<(&str, &str)> = docs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let index = index_of(&refs, 3);
        assert_eq!(retrieve_top_chunks(&index, "shared").len(), 3);
        assert_eq!(retrieve_top_k(&index, "shared", 5).len(), 5);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_of(&[("first", "alpha"), ("second", "alpha"), ("third", "alpha")], 4);
        let results = retrieve_top_chunks(&index, "alpha");
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["first#0", "second#0", "third#0"]);
    }

    #[test]
    fn test_coverage_bonus_prefers_broader_match() {
        let index = index_of(&[("narrow", "latency"), ("broad", "latency budget")], 4);
        let results = retrieve_top_chunks(&index, "latency budget");
        assert_eq!(results[0].chunk_id, "broad#0");
    }

    #[test]
    fn test_scores_sorted_descending() {
        let index = index_of(
            &[
                ("a", "tls certificate rotation"),
                ("b", "certificate"),
                ("c", "tls tls certificate certificate rotation rotation"),
            ],
            4,
        );
        let results = retrieve_top_chunks(&index, "tls certificate rotation");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
