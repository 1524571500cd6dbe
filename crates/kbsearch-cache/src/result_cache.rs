use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use kbsearch_core::types::RankedList;

use crate::key::{cache_key, meta_key};
use crate::{CacheBackend, CacheError};

const QUERY_PATTERN: &str = "query:*";
const DELETE_BATCH: usize = 100;

/// Which entries [`ResultCache::invalidate`] removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Keys matching a glob pattern.
    Pattern(String),
    /// Entries that may contain the document. No reverse index is kept, so
    /// this clears every cached query.
    Document(String),
    /// Every cached query.
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_hits: u64,
    pub total_misses: u64,
    pub hit_rate: f64,
    pub query_cache_count: usize,
}

pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn preview(query: &str) -> String {
    query.chars().take(50).collect()
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self { backend, default_ttl, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    pub async fn is_available(&self) -> bool {
        self.backend.ping().await.is_ok()
    }

    pub async fn get(&self, query: &str, top_k: usize) -> Option<RankedList> {
        let key = cache_key(query, top_k);
        let start = Instant::now();
        let raw = match self.backend.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "cache get error");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let Some(raw) = raw else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            info!(query = %preview(query), latency_ms, "cache miss");
            return None;
        };
        let results: RankedList = match serde_json::from_str(&raw) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, key = %key, "cached value is not a ranked list");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        // An empty list is recomputed: new chunks may have been indexed since.
        if results.is_empty() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            info!(query = %preview(query), latency_ms, "cache miss (empty entry)");
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        match self.backend.incr(&meta_key(&key), 1).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!(key = %key, "hit count expired before its entry"),
            Err(e) => warn!(error = %e, "failed to bump cache hit count"),
        }
        info!(query = %preview(query), results = results.len(), latency_ms, "cache hit");
        Some(results)
    }

    /// Store `results` for `(query, top_k)`, replacing any previous entry.
    /// `None` (or a zero duration) uses the configured TTL.
    pub async fn put(&self, query: &str, top_k: usize, results: &RankedList, ttl: Option<Duration>) -> bool {
        let ttl = ttl.filter(|t| !t.is_zero()).unwrap_or(self.default_ttl);
        let key = cache_key(query, top_k);
        let payload = match serde_json::to_string(results) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "failed to serialize results for cache");
                return false;
            }
        };
        let written: Result<(), CacheError> = async {
            self.backend.set_ex(&key, &payload, ttl).await?;
            self.backend.set_ex(&meta_key(&key), "0", ttl).await
        }
        .await;
        match written {
            Ok(()) => {
                debug!(query = %preview(query), ttl_secs = ttl.as_secs(), "cached results");
                true
            }
            Err(e) => {
                error!(error = %e, "cache set error");
                false
            }
        }
    }

    /// Times the entry has been served from cache since it was written.
    pub async fn hit_count(&self, query: &str, top_k: usize) -> Option<u64> {
        let key = meta_key(&cache_key(query, top_k));
        match self.backend.get(&key).await {
            Ok(v) => v.and_then(|s| s.parse().ok()),
            Err(e) => {
                warn!(error = %e, "failed to read cache hit count");
                None
            }
        }
    }

    /// Best-effort removal; returns how many keys were deleted, including
    /// those removed before a backend failure.
    pub async fn invalidate(&self, what: Invalidation) -> usize {
        let pattern = match &what {
            Invalidation::Pattern(p) => p.as_str(),
            Invalidation::Document(id) => {
                debug!(document_id = %id, "document change clears all cached queries");
                QUERY_PATTERN
            }
            Invalidation::All => QUERY_PATTERN,
        };
        let (deleted, failure) = self.delete_matching(pattern).await;
        match failure {
            None => info!(deleted, pattern, "invalidated cache entries"),
            Some(e) => error!(error = %e, deleted, pattern, "cache invalidation error"),
        }
        deleted
    }

    /// Remove every key in the backend.
    pub async fn clear_all(&self) -> usize {
        self.invalidate(Invalidation::Pattern("*".to_string())).await
    }

    /// Keys deleted before any failure, and the failure that stopped it.
    async fn delete_matching(&self, pattern: &str) -> (usize, Option<CacheError>) {
        let keys = match self.backend.scan(pattern).await {
            Ok(keys) => keys,
            Err(e) => return (0, Some(e)),
        };
        let mut deleted = 0;
        for batch in keys.chunks(DELETE_BATCH) {
            match self.backend.delete(batch).await {
                Ok(n) => deleted += n,
                Err(e) => return (deleted, Some(e)),
            }
        }
        (deleted, None)
    }

    pub async fn stats(&self) -> CacheStats {
        let total_hits = self.hits.load(Ordering::Relaxed);
        let total_misses = self.misses.load(Ordering::Relaxed);
        let total = total_hits + total_misses;
        let hit_rate = if total > 0 { total_hits as f64 / total as f64 } else { 0.0 };
        let query_cache_count = match self.backend.scan(QUERY_PATTERN).await {
            Ok(keys) => keys.iter().filter(|k| !k.ends_with(":meta")).count(),
            Err(e) => {
                error!(error = %e, "error getting cache stats");
                0
            }
        };
        CacheStats { total_hits, total_misses, hit_rate, query_cache_count }
    }
}
