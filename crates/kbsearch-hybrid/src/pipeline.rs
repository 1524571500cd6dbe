//! Retrieval orchestrator.
//!
//! A text query flows through expansion, a dense and a lexical channel, rank
//! fusion and optional reranking; an image channel runs alongside for
//! multimodal matches. Text-only requests are served from and written to the
//! result cache.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use kbsearch_cache::{Invalidation, ResultCache};
use kbsearch_core::config::{RetrievalSettings, Settings};
use kbsearch_core::error::with_timeout;
use kbsearch_core::traits::{FileStore, ImageEmbedder, TextEmbedder, VectorIndex};
use kbsearch_core::types::{Chunk, ImageChunk, ImageInput, Modality, RankedList, TextChunk};
use kbsearch_core::{Error, Result};
use kbsearch_rerank::Reranker;
use kbsearch_text::{lexical, TerminologyExpander};
use kbsearch_vector::VectorSearch;

use crate::fusion::fuse;

/// Per-request switches. Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub use_hybrid: bool,
    pub use_rerank: bool,
    pub use_cache: bool,
    pub use_expansion: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { use_hybrid: true, use_rerank: true, use_cache: true, use_expansion: true }
    }
}

pub struct RetrievalPipeline {
    expander: TerminologyExpander,
    text_embedder: Arc<dyn TextEmbedder>,
    image_embedder: Option<Arc<dyn ImageEmbedder>>,
    vectors: VectorSearch,
    reranker: Arc<Reranker>,
    cache: Option<Arc<ResultCache>>,
    files: Option<Arc<dyn FileStore>>,
    retrieval: RetrievalSettings,
    cache_enabled: bool,
    file_url_prefix: String,
}

impl RetrievalPipeline {
    /// Text-only pipeline with the default terminology table, no reranking
    /// model, no cache and no file store. Attach the rest with the `with_*`
    /// methods.
    pub fn new(text_embedder: Arc<dyn TextEmbedder>, index: Arc<dyn VectorIndex>, settings: &Settings) -> Self {
        Self {
            expander: TerminologyExpander::default(),
            text_embedder,
            image_embedder: None,
            vectors: VectorSearch::new(index),
            reranker: Arc::new(Reranker::new(None, settings.rerank.timeout())),
            cache: None,
            files: None,
            retrieval: settings.retrieval.clone(),
            cache_enabled: settings.cache.enabled,
            file_url_prefix: settings.storage.file_url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_expander(mut self, expander: TerminologyExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn with_image_embedder(mut self, embedder: Arc<dyn ImageEmbedder>) -> Self {
        self.image_embedder = Some(embedder);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_file_store(mut self, files: Arc<dyn FileStore>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn expander(&self) -> &TerminologyExpander {
        &self.expander
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Retrieve up to `top_k` chunks for a text query, an image, or both.
    ///
    /// Text-channel failures (embedding, vector search, timeouts) are
    /// returned as errors. Image-channel failures are logged and that
    /// channel's results dropped.
    pub async fn search(
        &self,
        query: Option<&str>,
        image: Option<&ImageInput>,
        top_k: usize,
        opts: &SearchOptions,
    ) -> Result<RankedList> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        if top_k == 0 || (query.is_none() && image.is_none()) {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let cache = match (query, image) {
            (Some(_), None) if opts.use_cache && self.cache_enabled => self.cache.as_ref(),
            _ => None,
        };
        if let (Some(cache), Some(q)) = (cache, query) {
            if let Some(hit) = cache.get(q, top_k).await {
                return Ok(hit);
            }
        }

        let expanded = match query {
            Some(q) if opts.use_expansion => Some(self.expander.expand(q)),
            Some(q) => Some(q.to_string()),
            None => None,
        };

        let mut results = match query {
            Some(q) if opts.use_hybrid => self.hybrid_text(q, expanded.as_deref().unwrap_or(q), top_k, opts.use_rerank).await?,
            Some(q) => self.plain_text(q, top_k, opts.use_rerank).await?,
            None => Vec::new(),
        };
        let text_count = results.len();

        if let Some(expanded) = expanded.as_deref() {
            match self.image_by_text(expanded, top_k).await {
                Ok(hits) => results.extend(hits),
                Err(e) => warn!(error = %e, "image search by text failed"),
            }
        }
        if let Some(image) = image {
            match self.image_by_image(image, top_k).await {
                Ok(hits) => {
                    for hit in hits {
                        let duplicate = results
                            .iter()
                            .any(|r| r.chunk.modality() == hit.chunk.modality() && r.id() == hit.id());
                        if !duplicate {
                            results.push(hit);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "image search by image failed"),
            }
        }

        results.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
        results.truncate(top_k);
        self.annotate_file_urls(&mut results).await;

        info!(
            text_candidates = text_count,
            returned = results.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "search completed"
        );

        if let (Some(cache), Some(q)) = (cache, query) {
            if !results.is_empty() {
                cache.put(q, top_k, &results, None).await;
            }
        }
        Ok(results)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        with_timeout("text embedding", self.retrieval.embed_timeout(), self.text_embedder.embed_text(text)).await
    }

    async fn search_collection(&self, modality: Modality, embedding: &[f32], limit: usize) -> Result<RankedList> {
        with_timeout("vector search", self.retrieval.vector_timeout(), self.vectors.search(modality, embedding, limit)).await
    }

    /// Dense + lexical channels fused by RRF, then reranked. One vector query
    /// fetches the lexical pool; the dense list is its prefix.
    async fn hybrid_text(&self, query: &str, expanded: &str, top_k: usize, use_rerank: bool) -> Result<RankedList> {
        let embedding = self.embed_query(expanded).await?;
        let fetch_k = if use_rerank { top_k * 4 } else { top_k * 2 };
        let pool = self.retrieval.lexical_pool_size;
        let candidates = self.search_collection(Modality::Text, &embedding, fetch_k.max(pool)).await?;

        let mut dense: RankedList = candidates.iter().take(fetch_k).cloned().collect();
        lexical::annotate(expanded, &mut dense);
        let mut keyword = lexical::rank(expanded, candidates.into_iter().take(pool).collect());
        keyword.truncate(fetch_k);

        let fusion_top_k = if use_rerank { self.retrieval.rerank_top_n * 2 } else { top_k };
        let fused = fuse(&dense, &keyword, fusion_top_k, self.retrieval.rrf_k);
        debug!(dense = dense.len(), keyword = keyword.len(), fused = fused.len(), "text channel fused");

        Ok(self.maybe_rerank(query, fused, top_k, use_rerank).await)
    }

    async fn plain_text(&self, query: &str, top_k: usize, use_rerank: bool) -> Result<RankedList> {
        let embedding = self.embed_query(query).await?;
        let hits = self.search_collection(Modality::Text, &embedding, top_k).await?;
        Ok(self.maybe_rerank(query, hits, top_k, use_rerank).await)
    }

    async fn maybe_rerank(&self, query: &str, mut candidates: RankedList, top_k: usize, use_rerank: bool) -> RankedList {
        if use_rerank && self.reranker.is_available() {
            debug!(candidates = candidates.len(), "reranking text candidates");
            return self.reranker.rerank(query, candidates, top_k).await.into_results();
        }
        candidates.truncate(top_k);
        candidates
    }

    async fn image_by_text(&self, expanded: &str, top_k: usize) -> Result<RankedList> {
        let Some(embedder) = self.image_embedder.as_ref() else {
            return Ok(Vec::new());
        };
        let embedding =
            with_timeout("image query embedding", self.retrieval.embed_timeout(), embedder.embed_query_text(expanded)).await?;
        self.search_collection(Modality::Image, &embedding, top_k).await
    }

    async fn image_by_image(&self, image: &ImageInput, top_k: usize) -> Result<RankedList> {
        let embedder = self
            .image_embedder
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no multimodal embedder configured".into()))?;
        let embedding = with_timeout("image embedding", self.retrieval.embed_timeout(), embedder.embed_image(image)).await?;
        self.search_collection(Modality::Image, &embedding, top_k).await
    }

    async fn annotate_file_urls(&self, results: &mut RankedList) {
        let Some(files) = self.files.as_ref() else {
            return;
        };
        let mut exists: HashMap<String, bool> = HashMap::new();
        for r in results.iter_mut() {
            let doc_id = r.chunk.document_id().to_string();
            let found = match exists.get(&doc_id) {
                Some(&found) => found,
                None => {
                    let found = files.file_exists(&doc_id).await;
                    exists.insert(doc_id.clone(), found);
                    found
                }
            };
            r.file_url = found.then(|| format!("{}/{}/file", self.file_url_prefix, doc_id));
        }
    }

    /// Embed and store text chunks; returns how many were written.
    pub async fn index_text_chunks(&self, chunks: &[TextChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings =
            with_timeout("text embedding", self.retrieval.embed_timeout(), self.text_embedder.embed_texts(&contents)).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let index = self.vectors.index();
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            index.upsert(Modality::Text, &Chunk::Text(chunk.clone()), embedding).await?;
        }
        info!(count = chunks.len(), "indexed text chunks");
        Ok(chunks.len())
    }

    pub async fn index_image_chunk(&self, chunk: ImageChunk) -> Result<()> {
        let embedder = self
            .image_embedder
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no multimodal embedder configured".into()))?;
        let input = ImageInput::Base64(chunk.image_payload.clone());
        let embedding = with_timeout("image embedding", self.retrieval.embed_timeout(), embedder.embed_image(&input)).await?;
        self.vectors.index().upsert(Modality::Image, &Chunk::Image(chunk), &embedding).await?;
        Ok(())
    }

    /// Remove a document's chunks from both collections and invalidate the
    /// query cache. Returns how many chunks were removed.
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let index = self.vectors.index();
        let text = index.delete_document(Modality::Text, document_id).await?;
        let images = index.delete_document(Modality::Image, document_id).await?;
        if let Some(cache) = self.cache.as_ref() {
            cache.invalidate(Invalidation::Document(document_id.to_string())).await;
        }
        info!(document_id, text, images, "deleted document");
        Ok(text + images)
    }
}
