use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use kbsearch_core::config::EmbeddingEndpoint;
use kbsearch_core::traits::TextEmbedder;
use kbsearch_core::types::Modality;
use kbsearch_core::{Error, Result};

use crate::http::EmbeddingClient;

const MAX_BATCH: usize = 256;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// OpenAI `text-embedding-3-*` (or any compatible endpoint).
pub struct OpenAiTextEmbedder {
    client: EmbeddingClient,
}

impl OpenAiTextEmbedder {
    pub fn new(cfg: &EmbeddingEndpoint, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self { client: EmbeddingClient::new(cfg, api_key, timeout, Modality::Text)? })
    }
}

#[async_trait]
impl TextEmbedder for OpenAiTextEmbedder {
    fn dim(&self) -> usize {
        self.client.dim()
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_texts(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| Error::Embedding("empty embedding response".into()))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let body = EmbedRequest { model: self.client.model(), input: batch };
            out.extend(self.client.post(&body, batch.len()).await?);
        }
        tracing::debug!(count = out.len(), model = self.client.model(), "embedded texts");
        Ok(out)
    }
}
