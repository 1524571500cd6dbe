use async_trait::async_trait;
use std::time::Duration;

use crate::CacheError;

/// Minimal key/value store contract, shaped after the Redis commands the
/// cache needs.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn ping(&self) -> Result<(), CacheError>;
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    /// Store `value` under `key`, replacing any previous value, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    /// Add `by` to the integer at a live `key` and return the new value,
    /// keeping its expiry. A missing or expired key is left absent and yields
    /// `None`.
    async fn incr(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError>;
    /// Live keys matching a glob pattern (`*`, `?`, `[..]`).
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
    /// Remove `keys`; returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError>;
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<glob::Pattern, CacheError> {
    glob::Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
