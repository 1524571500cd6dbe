//! Narrow contracts for the external collaborators the pipeline talks to.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, ImageInput, Modality, VectorHit};

/// Text embedding service. Vectors are only comparable with other vectors
/// produced by the same embedder.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Multimodal embedder that places images and text queries in one space.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed_query_text(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_image(&self, image: &ImageInput) -> Result<Vec<f32>>;
}

/// Nearest-neighbour index with one collection per modality.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the chunk with the same id.
    async fn upsert(&self, modality: Modality, chunk: &Chunk, vector: &[f32]) -> Result<()>;
    /// Up to `limit` hits ordered by cosine similarity, best first.
    async fn query(&self, modality: Modality, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>>;
    /// Remove every chunk of `document_id`; returns how many were removed.
    async fn delete_document(&self, modality: Modality, document_id: &str) -> Result<usize>;
}

/// Lookup into the store holding original uploaded files.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn file_exists(&self, document_id: &str) -> bool;
}
