#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Embedding clients for the text and multimodal channels.
//!
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) to switch to
//! [`HashEmbedder`] for fast and deterministic outputs in tests and development.

mod http;
pub mod hash;
pub mod jina;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use kbsearch_core::config::EmbeddingSettings;
use kbsearch_core::traits::{ImageEmbedder, TextEmbedder};
use kbsearch_core::{Error, Result};

pub use hash::HashEmbedder;
pub use jina::JinaClipEmbedder;
pub use openai::OpenAiTextEmbedder;

pub fn use_fake_embeddings(settings: &EmbeddingSettings) -> bool {
    settings.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}

fn api_key(configured: &str, fallback_var: &str) -> Option<String> {
    if !configured.trim().is_empty() {
        return Some(configured.to_string());
    }
    std::env::var(fallback_var).ok().filter(|k| !k.trim().is_empty())
}

/// Text embedder for the configured provider. `timeout` bounds each request.
pub fn text_embedder(settings: &EmbeddingSettings, timeout: Duration) -> Result<Arc<dyn TextEmbedder>> {
    if use_fake_embeddings(settings) {
        tracing::info!(dim = settings.text.dim, "using hash embedder for text");
        return Ok(Arc::new(HashEmbedder::new(settings.text.dim)));
    }
    let key = api_key(&settings.text.api_key, "OPENAI_API_KEY")
        .ok_or_else(|| Error::InvalidConfig("embedding.text.api_key is not set".into()))?;
    Ok(Arc::new(OpenAiTextEmbedder::new(&settings.text, key, timeout)?))
}

/// Multimodal embedder for the image channel.
pub fn image_embedder(settings: &EmbeddingSettings, timeout: Duration) -> Result<Arc<dyn ImageEmbedder>> {
    if use_fake_embeddings(settings) {
        tracing::info!(dim = settings.image.dim, "using hash embedder for images");
        return Ok(Arc::new(HashEmbedder::new(settings.image.dim)));
    }
    let key = api_key(&settings.image.api_key, "JINA_API_KEY")
        .ok_or_else(|| Error::InvalidConfig("embedding.image.api_key is not set".into()))?;
    Ok(Arc::new(JinaClipEmbedder::new(&settings.image, key, timeout)?))
}
