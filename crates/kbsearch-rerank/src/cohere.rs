//! Cohere-compatible `/rerank` client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use kbsearch_core::config::RerankSettings;

use crate::{RerankError, RerankHit, RerankService};

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

pub struct CohereRerankClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl CohereRerankClient {
    pub fn new(endpoint: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self, RerankError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RerankError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    pub fn from_settings(settings: &RerankSettings) -> Result<Self, RerankError> {
        Self::new(&settings.endpoint, &settings.model, &settings.api_key, settings.timeout())
    }

    fn millis(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl RerankService for CohereRerankClient {
    async fn score(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankHit>, RerankError> {
        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n,
            return_documents: false,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RerankError::Timeout(self.millis())
                } else {
                    RerankError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RerankError::Unauthorized(text),
                StatusCode::TOO_MANY_REQUESTS => RerankError::RateLimited(text),
                _ => RerankError::Transport(format!("{} returned {}: {}", self.endpoint, status, text)),
            });
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| RerankError::InvalidResponse(e.to_string()))?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| RerankHit { index: r.index, relevance_score: r.relevance_score })
            .collect())
    }
}
