//! Shared plumbing for OpenAI-compatible `/embeddings` endpoints.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use kbsearch_core::config::EmbeddingEndpoint;
use kbsearch_core::types::Modality;
use kbsearch_core::{Error, Result};

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub(crate) struct EmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    dim: usize,
    modality: Modality,
    timeout: Duration,
}

impl EmbeddingClient {
    pub(crate) fn new(cfg: &EmbeddingEndpoint, api_key: String, timeout: Duration, modality: Modality) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig(format!("{} embedding endpoint is empty", modality)));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key,
            dim: cfg.dim,
            modality,
            timeout,
        })
    }

    pub(crate) fn dim(&self) -> usize {
        self.dim
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    /// POST `body` and return the embeddings ordered by their `index` field.
    pub(crate) async fn post<B: Serialize + ?Sized>(&self, body: &B, expected: usize) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("{} returned {}: {}", self.endpoint, status, text)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("invalid embedding response: {}", e)))?;
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        if data.len() != expected {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                expected,
                data.len()
            )));
        }
        data.into_iter()
            .map(|d| {
                if d.embedding.len() != self.dim {
                    return Err(Error::DimensionMismatch {
                        modality: self.modality,
                        expected: self.dim,
                        actual: d.embedding.len(),
                    });
                }
                Ok(d.embedding)
            })
            .collect()
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                stage: "embedding",
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            Error::Embedding(format!("request to {} failed: {}", self.endpoint, e))
        }
    }
}
