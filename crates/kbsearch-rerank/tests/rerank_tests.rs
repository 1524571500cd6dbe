use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kbsearch_core::config::RerankSettings;
use kbsearch_core::types::{Chunk, RankedList, ScoredChunk, TextChunk};
use kbsearch_rerank::{
    CohereRerankClient, FallbackReason, RerankError, RerankHit, RerankOutcome, RerankService, Reranker,
};

fn candidates(n: usize) -> RankedList {
    (0..n)
        .map(|i| {
            ScoredChunk::new(
                Chunk::Text(TextChunk {
                    id: format!("c{}", i),
                    document_id: "doc".to_string(),
                    document_name: "doc.pdf".to_string(),
                    content: format!("passage {}", i),
                }),
                1.0 - i as f32 * 0.1,
            )
        })
        .collect()
}

enum Script {
    Reverse,
    Fail(fn() -> RerankError),
    Hang,
}

struct ScriptedService {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedService {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl RerankService for ScriptedService {
    async fn score(&self, _query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>, RerankError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reverse => Ok((0..documents.len())
                .rev()
                .take(top_n)
                .enumerate()
                .map(|(rank, index)| RerankHit { index, relevance_score: 0.9 - rank as f32 * 0.1 })
                .collect()),
            Script::Fail(make) => Err(make()),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Vec::new())
            }
        }
    }
}

fn reranker(service: &Arc<ScriptedService>) -> Reranker {
    Reranker::new(Some(service.clone() as Arc<dyn RerankService>), Duration::from_millis(200))
}

#[tokio::test]
async fn reranked_results_follow_service_order() {
    let service = ScriptedService::new(Script::Reverse);
    let outcome = reranker(&service).rerank("q", candidates(4), 2).await;
    let RerankOutcome::Reranked(results) = outcome else { panic!("expected reranked") };
    let ids: Vec<&str> = results.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["c3", "c2"]);
    assert_eq!(results[0].relevance_score, Some(0.9));
    assert!(!results[0].rerank_fallback);
}

#[tokio::test]
async fn empty_candidates_skip_the_network() {
    let service = ScriptedService::new(Script::Reverse);
    let outcome = reranker(&service).rerank("q", Vec::new(), 5).await;
    assert_eq!(outcome, RerankOutcome::Reranked(Vec::new()));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unauthorized_disables_for_later_calls() {
    let service = ScriptedService::new(Script::Fail(|| RerankError::Unauthorized("bad key".into())));
    let r = reranker(&service);
    assert!(r.is_available());

    let first = r.rerank("q", candidates(3), 2).await;
    assert!(matches!(first, RerankOutcome::Fallback { reason: FallbackReason::Unauthorized, .. }));
    assert!(!r.is_available());

    let second = r.rerank("q", candidates(3), 2).await;
    match second {
        RerankOutcome::Fallback { results, reason } => {
            assert_eq!(reason, FallbackReason::Disabled);
            let ids: Vec<&str> = results.iter().map(|r| r.id()).collect();
            assert_eq!(ids, vec!["c0", "c1"]);
            assert!(results.iter().all(|c| c.rerank_fallback));
            assert!(results.iter().all(|c| c.relevance_score == Some(c.similarity_score)));
        }
        other => panic!("expected fallback, got {:?}", other),
    }
    assert_eq!(service.calls.load(Ordering::SeqCst), 1, "no request after disabling");
}

#[tokio::test]
async fn rate_limit_degrades_only_the_current_call() {
    let service = ScriptedService::new(Script::Fail(|| RerankError::RateLimited("slow down".into())));
    let r = reranker(&service);
    let outcome = r.rerank("q", candidates(3), 5).await;
    assert!(matches!(outcome, RerankOutcome::Fallback { reason: FallbackReason::RateLimited, .. }));
    assert_eq!(outcome.results().len(), 3);
    assert!(r.is_available());
    r.rerank("q", candidates(3), 5).await;
    assert_eq!(service.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_service_times_out_into_fallback() {
    let service = ScriptedService::new(Script::Hang);
    let outcome = reranker(&service).rerank("q", candidates(2), 2).await;
    assert!(matches!(outcome, RerankOutcome::Fallback { reason: FallbackReason::Timeout, .. }));
}

#[tokio::test]
async fn unconfigured_reranker_skips() {
    let r = Reranker::from_settings(&RerankSettings::default());
    assert!(!r.is_available());
    let outcome = r.rerank("q", candidates(4), 3).await;
    let RerankOutcome::Skipped(results) = outcome else { panic!("expected skipped") };
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|c| !c.rerank_fallback && c.relevance_score.is_none()));
}

#[tokio::test]
async fn batch_reranks_each_pair() {
    let service = ScriptedService::new(Script::Reverse);
    let out = reranker(&service)
        .rerank_batch(&["a".to_string(), "b".to_string()], vec![candidates(2), candidates(3)], 1)
        .await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].results()[0].id(), "c1");
    assert_eq!(out[1].results()[0].id(), "c2");
}

#[tokio::test]
async fn cohere_client_parses_results() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/rerank").header("authorization", "Bearer key");
            then.status(200).json_body(json!({
                "id": "r1",
                "results": [
                    { "index": 1, "relevance_score": 0.97 },
                    { "index": 0, "relevance_score": 0.12 }
                ]
            }));
        })
        .await;
    let client = CohereRerankClient::new(&server.url("/v2/rerank"), "rerank-v3.5", "key", Duration::from_secs(5)).unwrap();
    let hits = client
        .score("brake", &["wheel".to_string(), "brake pad".to_string()], 2)
        .await
        .unwrap();
    assert_eq!(hits[0], RerankHit { index: 1, relevance_score: 0.97 });
    assert_eq!(hits.len(), 2);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn cohere_status_codes_map_to_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/unauthorized");
            then.status(401).body("invalid api token");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/limited");
            then.status(429).body("too many requests");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/broken");
            then.status(500).body("oops");
        })
        .await;

    let docs = vec!["x".to_string()];
    let client = |path: &str| CohereRerankClient::new(&server.url(path), "m", "k", Duration::from_secs(5)).unwrap();
    assert!(matches!(client("/unauthorized").score("q", &docs, 1).await, Err(RerankError::Unauthorized(_))));
    assert!(matches!(client("/limited").score("q", &docs, 1).await, Err(RerankError::RateLimited(_))));
    assert!(matches!(client("/broken").score("q", &docs, 1).await, Err(RerankError::Transport(_))));
}

#[tokio::test]
async fn http_auth_failure_disables_reranker_end_to_end() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/rerank");
            then.status(401).body("invalid api token");
        })
        .await;
    let settings = RerankSettings {
        api_key: "bad".to_string(),
        endpoint: server.url("/v2/rerank"),
        ..RerankSettings::default()
    };
    let r = Reranker::from_settings(&settings);
    assert!(r.rerank("q", candidates(2), 2).await.is_fallback());
    assert!(r.rerank("q", candidates(2), 2).await.is_fallback());
    assert_eq!(mock.hits_async().await, 1);
}
