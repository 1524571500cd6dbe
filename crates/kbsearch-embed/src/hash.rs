use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use kbsearch_core::traits::{ImageEmbedder, TextEmbedder};
use kbsearch_core::types::ImageInput;
use kbsearch_core::Result;

/// Deterministic token-hash embedder. Each whitespace token lands in one
/// bucket; the vector is L2-normalized, so texts sharing tokens have positive
/// cosine similarity.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

#[async_trait]
impl ImageEmbedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_query_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    // The whole payload is one token: identical images embed identically.
    async fn embed_image(&self, image: &ImageInput) -> Result<Vec<f32>> {
        Ok(self.embed_sync(&image.to_base64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_normalized_and_deterministic() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("brake inspection");
        let b = e.embed_sync("brake inspection");
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn shared_tokens_give_positive_similarity() {
        let e = HashEmbedder::new(256);
        let q = e.embed_sync("brake");
        let d = e.embed_sync("brake pad wear");
        assert!(dot(&q, &d) > 0.0);
    }

    #[test]
    fn empty_text_yields_zero_vector() {
        let e = HashEmbedder::new(8);
        assert!(e.embed_sync("   ").iter().all(|x| *x == 0.0));
    }
}
