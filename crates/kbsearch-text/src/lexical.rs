//! Lexical relevance channel.
//!
//! A term-frequency heuristic rather than BM25: each distinct lowercase query
//! term contributes `count / (count + 1) * len(term)` where `count` is its
//! number of non-overlapping occurrences in the lowercased document and `len`
//! is its length in characters. Longer matched terms weigh more and repeated
//! occurrences saturate.

use std::cmp::Ordering;
use std::collections::HashSet;

use kbsearch_core::types::{RankedList, ScoredChunk};

/// Distinct lowercase whitespace-delimited terms, in first-seen order.
fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn score_terms(terms: &[String], document: &str) -> f32 {
    let doc = document.to_lowercase();
    terms
        .iter()
        .map(|term| {
            let count = doc.matches(term.as_str()).count();
            if count == 0 {
                0.0
            } else {
                let count = count as f32;
                count / (count + 1.0) * term.chars().count() as f32
            }
        })
        .sum()
}

pub fn score(query: &str, document: &str) -> f32 {
    score_terms(&query_terms(query), document)
}

/// Set `lexical_score` on each candidate without reordering.
pub fn annotate(query: &str, candidates: &mut [ScoredChunk]) {
    let terms = query_terms(query);
    for c in candidates {
        c.lexical_score = Some(score_terms(&terms, c.chunk.text()));
    }
}

/// Order candidates by lexical score, best first. Ties keep input order.
/// Every candidate gets its `lexical_score` set.
pub fn rank(query: &str, candidates: RankedList) -> RankedList {
    let mut ranked = candidates;
    annotate(query, &mut ranked);
    ranked.sort_by(|a, b| {
        b.lexical_score
            .partial_cmp(&a.lexical_score)
            .unwrap_or(Ordering::Equal)
    });
    tracing::debug!(candidates = ranked.len(), "lexical ranking");
    ranked
}
