use std::sync::Arc;

use kbsearch_core::traits::VectorIndex;
use kbsearch_core::types::{Modality, RankedList, ScoredChunk};
use kbsearch_core::Result;

/// Nearest-neighbour search over one modality's collection, returned as a
/// ranked list with `similarity_score` set.
#[derive(Clone)]
pub struct VectorSearch {
    index: Arc<dyn VectorIndex>,
}

impl VectorSearch {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub async fn search(&self, modality: Modality, query_embedding: &[f32], top_k: usize) -> Result<RankedList> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let hits = self.index.query(modality, query_embedding, top_k).await?;
        tracing::debug!(%modality, requested = top_k, returned = hits.len(), "vector search");
        Ok(hits.into_iter().map(ScoredChunk::from).collect())
    }
}
