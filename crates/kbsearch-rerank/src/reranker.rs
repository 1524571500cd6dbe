use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kbsearch_core::config::RerankSettings;
use kbsearch_core::types::RankedList;
use tracing::{debug, error, info, warn};

use crate::{CohereRerankClient, RerankError, RerankService};

/// Why a rerank call fell back to the input order.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Reranking was switched off earlier in the process.
    Disabled,
    Unauthorized,
    RateLimited,
    Timeout,
    Failed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Disabled => f.write_str("reranker disabled"),
            FallbackReason::Unauthorized => f.write_str("authentication failed"),
            FallbackReason::RateLimited => f.write_str("rate limit exceeded"),
            FallbackReason::Timeout => f.write_str("timed out"),
            FallbackReason::Failed(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    /// Reordered by the relevance model, each result carrying its score.
    Reranked(RankedList),
    /// Input order kept; `relevance_score` mirrors the similarity score and
    /// every result is flagged `rerank_fallback`.
    Fallback { results: RankedList, reason: FallbackReason },
    /// No relevance model configured; input order, no annotations.
    Skipped(RankedList),
}

impl RerankOutcome {
    pub fn results(&self) -> &RankedList {
        match self {
            RerankOutcome::Reranked(r) | RerankOutcome::Skipped(r) => r,
            RerankOutcome::Fallback { results, .. } => results,
        }
    }

    pub fn into_results(self) -> RankedList {
        match self {
            RerankOutcome::Reranked(r) | RerankOutcome::Skipped(r) => r,
            RerankOutcome::Fallback { results, .. } => results,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RerankOutcome::Fallback { .. })
    }
}

/// Reranking front end. Authentication failures disable it for the life of
/// the value; every other failure degrades only the current call.
pub struct Reranker {
    service: Option<Arc<dyn RerankService>>,
    enabled: AtomicBool,
    timeout: Duration,
}

impl Reranker {
    pub fn new(service: Option<Arc<dyn RerankService>>, timeout: Duration) -> Self {
        let enabled = AtomicBool::new(service.is_some());
        Self { service, enabled, timeout }
    }

    /// Cohere client when an API key is configured, otherwise an unconfigured
    /// reranker that passes candidates through.
    pub fn from_settings(settings: &RerankSettings) -> Self {
        if !settings.is_configured() {
            warn!("rerank API key not configured; reranker disabled");
            return Self::new(None, settings.timeout());
        }
        match CohereRerankClient::from_settings(settings) {
            Ok(client) => {
                info!(model = %settings.model, "rerank client initialized");
                Self::new(Some(Arc::new(client)), settings.timeout())
            }
            Err(e) => {
                error!(error = %e, "failed to initialize rerank client");
                Self::new(None, settings.timeout())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.service.is_some() && self.enabled.load(Ordering::Acquire)
    }

    /// Rerank `candidates` against `query` (the user's original wording) and
    /// keep the best `top_n`.
    pub async fn rerank(&self, query: &str, candidates: RankedList, top_n: usize) -> RerankOutcome {
        if candidates.is_empty() || top_n == 0 {
            return RerankOutcome::Reranked(Vec::new());
        }
        let Some(service) = self.service.as_ref() else {
            debug!("reranker unavailable, keeping original order");
            let mut results = candidates;
            results.truncate(top_n);
            return RerankOutcome::Skipped(results);
        };
        if !self.enabled.load(Ordering::Acquire) {
            return fallback(candidates, top_n, FallbackReason::Disabled);
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.chunk.text().to_string()).collect();
        let n = top_n.min(candidates.len());
        let start = Instant::now();
        let scored = match tokio::time::timeout(self.timeout, service.score(query, &documents, n)).await {
            Ok(res) => res,
            Err(_) => Err(RerankError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))),
        };

        match scored {
            Ok(hits) => {
                let mut results = Vec::with_capacity(hits.len().min(n));
                for hit in hits.into_iter().take(n) {
                    let Some(candidate) = candidates.get(hit.index) else {
                        let reason = FallbackReason::Failed(format!("result index {} out of range", hit.index));
                        return fallback(candidates, top_n, reason);
                    };
                    let mut c = candidate.clone();
                    c.relevance_score = Some(hit.relevance_score);
                    results.push(c);
                }
                info!(
                    query = %preview(query),
                    docs = candidates.len(),
                    top_n = n,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "rerank completed"
                );
                RerankOutcome::Reranked(results)
            }
            Err(RerankError::Unauthorized(msg)) => {
                error!(error = %msg, "rerank authentication failed; disabling reranker");
                self.enabled.store(false, Ordering::Release);
                fallback(candidates, top_n, FallbackReason::Unauthorized)
            }
            Err(RerankError::RateLimited(msg)) => {
                warn!(error = %msg, "rerank rate limit exceeded");
                fallback(candidates, top_n, FallbackReason::RateLimited)
            }
            Err(RerankError::Timeout(ms)) => {
                warn!(timeout_ms = ms, "rerank timed out");
                fallback(candidates, top_n, FallbackReason::Timeout)
            }
            Err(e) => {
                error!(error = %e, "rerank error");
                fallback(candidates, top_n, FallbackReason::Failed(e.to_string()))
            }
        }
    }

    /// Rerank several query/candidate pairs, one after another.
    pub async fn rerank_batch(&self, queries: &[String], candidate_lists: Vec<RankedList>, top_n: usize) -> Vec<RerankOutcome> {
        let mut out = Vec::with_capacity(queries.len().min(candidate_lists.len()));
        for (query, candidates) in queries.iter().zip(candidate_lists) {
            out.push(self.rerank(query, candidates, top_n).await);
        }
        out
    }
}

fn fallback(mut candidates: RankedList, top_n: usize, reason: FallbackReason) -> RerankOutcome {
    warn!(reason = %reason, "reranker fallback activated");
    candidates.truncate(top_n);
    for c in &mut candidates {
        c.rerank_fallback = true;
        c.relevance_score = Some(c.similarity_score);
    }
    RerankOutcome::Fallback { results: candidates, reason }
}

fn preview(query: &str) -> String {
    query.chars().take(50).collect()
}
