use thiserror::Error;

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("authentication rejected: {0}")]
    Unauthorized(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("rerank request timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid rerank response: {0}")]
    InvalidResponse(String),
}
