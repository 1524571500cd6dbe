use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("value at '{0}' is not an integer")]
    NotAnInteger(String),

    #[error("cache backend error: {0}")]
    Backend(String),
}
