use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use kbsearch_core::config::EmbeddingEndpoint;
use kbsearch_core::traits::ImageEmbedder;
use kbsearch_core::types::{ImageInput, Modality};
use kbsearch_core::{Error, Result};

use crate::http::EmbeddingClient;

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum ClipInput {
    Text(String),
    Image(String),
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: [ClipInput; 1],
}

/// Jina CLIP: images and text queries share one embedding space.
pub struct JinaClipEmbedder {
    client: EmbeddingClient,
}

impl JinaClipEmbedder {
    pub fn new(cfg: &EmbeddingEndpoint, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self { client: EmbeddingClient::new(cfg, api_key, timeout, Modality::Image)? })
    }

    async fn embed_one(&self, input: ClipInput) -> Result<Vec<f32>> {
        let body = EmbedRequest { model: self.client.model(), input: [input] };
        let mut out = self.client.post(&body, 1).await?;
        out.pop().ok_or_else(|| Error::Embedding("empty embedding response".into()))
    }
}

#[async_trait]
impl ImageEmbedder for JinaClipEmbedder {
    fn dim(&self) -> usize {
        self.client.dim()
    }

    async fn embed_query_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(ClipInput::Text(text.to_string())).await
    }

    async fn embed_image(&self, image: &ImageInput) -> Result<Vec<f32>> {
        self.embed_one(ClipInput::Image(image.to_base64())).await
    }
}
