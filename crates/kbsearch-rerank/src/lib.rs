#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Cross-encoder reranking with graceful degradation.
//!
//! [`Reranker`] owns the enabled/disabled state and never fails: scoring
//! errors turn into a [`RerankOutcome::Fallback`] that keeps the input order.

pub mod cohere;
pub mod error;
pub mod reranker;

pub use cohere::CohereRerankClient;
pub use error::RerankError;
pub use reranker::{FallbackReason, RerankOutcome, Reranker};

use async_trait::async_trait;

/// One scored document, referring back to its position in the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    pub relevance_score: f32,
}

/// External relevance model: scores `documents` against `query` and returns
/// at most `top_n` hits, best first.
#[async_trait]
pub trait RerankService: Send + Sync {
    async fn score(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>, RerankError>;
}
