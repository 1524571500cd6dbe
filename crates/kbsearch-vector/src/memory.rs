use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

use kbsearch_core::traits::VectorIndex;
use kbsearch_core::types::{Chunk, Modality, VectorHit};
use kbsearch_core::Result;

use crate::{check_dim, check_write};

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// In-process index. Rows keep insertion order, which breaks similarity ties.
pub struct MemoryVectorIndex {
    dims: HashMap<Modality, usize>,
    rows: RwLock<HashMap<Modality, Vec<(Chunk, Vec<f32>)>>>,
}

impl MemoryVectorIndex {
    pub fn new(text_dim: usize, image_dim: usize) -> Self {
        let dims = HashMap::from([(Modality::Text, text_dim), (Modality::Image, image_dim)]);
        Self { dims, rows: RwLock::new(HashMap::new()) }
    }

    fn dim(&self, modality: Modality) -> usize {
        self.dims.get(&modality).copied().unwrap_or(0)
    }

    pub fn len(&self, modality: Modality) -> usize {
        self.rows.read().get(&modality).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().values().all(Vec::is_empty)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, modality: Modality, chunk: &Chunk, vector: &[f32]) -> Result<()> {
        check_write(modality, self.dim(modality), chunk, vector)?;
        let mut rows = self.rows.write();
        let table = rows.entry(modality).or_default();
        match table.iter_mut().find(|(c, _)| c.id() == chunk.id()) {
            Some(row) => *row = (chunk.clone(), vector.to_vec()),
            None => table.push((chunk.clone(), vector.to_vec())),
        }
        Ok(())
    }

    async fn query(&self, modality: Modality, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        check_dim(modality, self.dim(modality), vector)?;
        let rows = self.rows.read();
        let Some(table) = rows.get(&modality) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<VectorHit> = table
            .iter()
            .map(|(chunk, v)| VectorHit { chunk: chunk.clone(), score: cosine(vector, v) })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_document(&self, modality: Modality, document_id: &str) -> Result<usize> {
        let mut rows = self.rows.write();
        let Some(table) = rows.get_mut(&modality) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|(c, _)| c.document_id() != document_id);
        Ok(before - table.len())
    }
}

#[cfg(test)]
mod tests {
    use super::cosine;

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
