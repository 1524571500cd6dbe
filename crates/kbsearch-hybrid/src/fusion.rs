//! Reciprocal rank fusion.

use indexmap::IndexMap;
use std::cmp::Ordering;

use kbsearch_core::types::{RankedList, ScoredChunk};

pub const DEFAULT_RRF_K: u32 = 60;

/// Merge two ranked lists by `Σ 1/(k + rank + 1)` over the lists each chunk
/// appears in (0-based rank), keep the best `top_k`.
///
/// The payload of a chunk comes from the list that introduced it first, `a`
/// before `b`. Equal fused scores keep first-introduction order, so the
/// result depends only on the inputs.
pub fn fuse(a: &[ScoredChunk], b: &[ScoredChunk], top_k: usize, k: u32) -> RankedList {
    let k = f64::from(k);
    let mut fused: IndexMap<&str, (f64, &ScoredChunk)> = IndexMap::new();
    for list in [a, b] {
        for (rank, item) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f64 + 1.0);
            fused
                .entry(item.id())
                .and_modify(|(score, _)| *score += contribution)
                .or_insert((contribution, item));
        }
    }

    let mut ordered: Vec<(f64, &ScoredChunk)> = fused.into_values().collect();
    ordered.sort_by(|x, y| y.0.partial_cmp(&x.0).unwrap_or(Ordering::Equal));
    ordered
        .into_iter()
        .take(top_k)
        .map(|(score, item)| {
            let mut c = item.clone();
            c.fused_score = Some(score as f32);
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbsearch_core::types::{Chunk, TextChunk};

    fn item(id: &str, content: &str) -> ScoredChunk {
        ScoredChunk::new(
            Chunk::Text(TextChunk {
                id: id.to_string(),
                document_id: "doc".to_string(),
                document_name: "doc.pdf".to_string(),
                content: content.to_string(),
            }),
            0.5,
        )
    }

    fn ids(list: &RankedList) -> Vec<&str> {
        list.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn shared_candidates_rank_first() {
        let a = vec![item("a", ""), item("b", ""), item("c", "")];
        let b = vec![item("c", ""), item("a", ""), item("d", "")];
        let out = fuse(&a, &b, 4, DEFAULT_RRF_K);
        assert_eq!(ids(&out), vec!["a", "c", "b", "d"]);
        let expected_a = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((f64::from(out[0].fused_score.unwrap_or(0.0)) - expected_a).abs() < 1e-6);
    }

    #[test]
    fn first_list_payload_wins() {
        let a = vec![item("x", "from a")];
        let b = vec![item("x", "from b")];
        let out = fuse(&a, &b, 5, DEFAULT_RRF_K);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chunk.text(), "from a");
    }

    #[test]
    fn ties_keep_introduction_order_and_truncate() {
        let a = vec![item("p", ""), item("q", "")];
        let b = vec![item("r", ""), item("s", "")];
        let out = fuse(&a, &b, 3, DEFAULT_RRF_K);
        // p and r tie at rank 0, q and s at rank 1
        assert_eq!(ids(&out), vec!["p", "r", "q"]);
        assert_eq!(fuse(&a, &b, 3, DEFAULT_RRF_K), out);
    }

    #[test]
    fn empty_inputs() {
        assert!(fuse(&[], &[], 5, DEFAULT_RRF_K).is_empty());
        assert_eq!(ids(&fuse(&[], &[item("z", "")], 5, DEFAULT_RRF_K)), vec!["z"]);
    }
}
