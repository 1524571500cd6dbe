use kbsearch_core::types::{Chunk, ScoredChunk, TextChunk};
use kbsearch_text::{lexical, TerminologyExpander};

fn candidate(id: &str, content: &str, similarity: f32) -> ScoredChunk {
    ScoredChunk::new(
        Chunk::Text(TextChunk {
            id: id.to_string(),
            document_id: format!("doc-{}", id),
            document_name: "manual.pdf".to_string(),
            content: content.to_string(),
        }),
        similarity,
    )
}

#[test]
fn expansion_is_single_hop_and_keeps_table_order() {
    let ex = TerminologyExpander::default();
    let out = ex.expand("煞車系統檢修");
    assert_eq!(out, "煞車系統檢修 brake 制動 軔機 inspection 維修 檢查 保養");
    // "brake" is added but entries keyed on other brake terms are not pulled in.
    assert!(!out.contains("brake cylinder"));
    assert!(!out.contains("煞車片"));
}

#[test]
fn expansion_matches_synonyms_case_insensitively() {
    let ex = TerminologyExpander::default();
    let out = ex.expand("AIR SPRING leak");
    assert!(out.starts_with("AIR SPRING leak "));
    assert!(out.contains("空氣彈簧"));
    assert!(out.contains("氣墊"));
}

#[test]
fn normalize_and_synonym_lookup() {
    let ex = TerminologyExpander::default();
    assert_eq!(ex.normalize_term("Bogie"), "轉向架");
    assert_eq!(ex.normalize_term("unknown part"), "unknown part");
    assert_eq!(ex.synonyms_of("主變"), vec!["主變壓器", "main transformer", "主變"]);
    assert_eq!(ex.synonyms_of("xyz"), vec!["xyz"]);
}

#[test]
fn component_and_action_extraction() {
    let ex = TerminologyExpander::default();
    let text = "拆卸轉向架後檢修空氣彈簧";
    assert_eq!(ex.extract_components(text), vec!["轉向架", "空氣彈簧", "拆卸", "檢修"]);
    assert_eq!(ex.extract_actions(text), vec!["拆卸", "檢修"]);
}

#[test]
fn rank_orders_by_lexical_score_and_is_stable() {
    let candidates = vec![
        candidate("a", "nothing relevant", 0.9),
        candidate("b", "wheel wheel wheel", 0.5),
        candidate("c", "also unrelated", 0.8),
        candidate("d", "wheel", 0.1),
    ];
    let ranked = lexical::rank("wheel", candidates);
    let ids: Vec<&str> = ranked.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["b", "d", "a", "c"]);
    assert!(ranked.iter().all(|c| c.lexical_score.is_some()));
    assert_eq!(ranked[2].lexical_score, Some(0.0));
    assert_eq!(ranked[0].similarity_score, 0.5, "similarity is carried through");
}
