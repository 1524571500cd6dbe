#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Vector index backends and the search adapter used by the text and image
//! channels.
//!
//! - [`LanceVectorIndex`]: LanceDB tables, one per modality
//! - [`MemoryVectorIndex`]: brute-force cosine, for tests and small corpora

pub mod lance;
pub mod memory;
pub mod schema;
pub mod search;

pub use lance::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use search::VectorSearch;

use kbsearch_core::types::{Chunk, Modality};
use kbsearch_core::{Error, Result};

/// Per-collection write checks shared by every backend.
pub(crate) fn check_write(modality: Modality, expected_dim: usize, chunk: &Chunk, vector: &[f32]) -> Result<()> {
    if chunk.modality() != modality {
        return Err(Error::ModalityMismatch {
            chunk_id: chunk.id().to_string(),
            expected: modality,
            actual: chunk.modality(),
        });
    }
    check_dim(modality, expected_dim, vector)
}

pub(crate) fn check_dim(modality: Modality, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch { modality, expected, actual: vector.len() });
    }
    Ok(())
}
