use thiserror::Error;

use crate::types::Modality;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("{modality} vector has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        modality: Modality,
        expected: usize,
        actual: usize,
    },

    #[error("chunk {chunk_id} is {actual}, cannot be stored in the {expected} collection")]
    ModalityMismatch {
        chunk_id: String,
        expected: Modality,
        actual: Modality,
    },

    #[error("{stage} timed out after {millis}ms")]
    Timeout { stage: &'static str, millis: u64 },

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Bound an external call by `limit`, mapping expiry to [`Error::Timeout`].
pub async fn with_timeout<T, F>(stage: &'static str, limit: std::time::Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout { stage, millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX) }),
    }
}
