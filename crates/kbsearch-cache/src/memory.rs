//! In-process [`CacheBackend`] with per-key expiry.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::backend::compile_pattern;
use crate::{CacheBackend, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| t > now)
    }
}

#[derive(Default)]
pub struct MemoryCacheBackend {
    map: DashMap<String, Entry>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries. Runs on every write and scan.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, e| e.is_live(now));
        before - self.map.len()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        if let Some(e) = self.map.get(key) {
            if e.is_live(now) {
                return Ok(Some(e.value.clone()));
            }
        } else {
            return Ok(None);
        }
        self.map.remove_if(key, |_, e| !e.is_live(now));
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.purge_expired();
        let expires_at = Instant::now().checked_add(ttl);
        self.map.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        let now = Instant::now();
        {
            let Some(mut entry) = self.map.get_mut(key) else {
                return Ok(None);
            };
            if entry.is_live(now) {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
                let next = current.saturating_add(by);
                entry.value = next.to_string();
                return Ok(Some(next));
            }
        }
        self.map.remove_if(key, |_, e| !e.is_live(now));
        Ok(None)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matcher = compile_pattern(pattern)?;
        self.purge_expired();
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .map
            .iter()
            .filter(|e| e.value().is_live(now) && matcher.matches(e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        let now = Instant::now();
        Ok(keys
            .iter()
            .filter_map(|k| self.map.remove(k))
            .filter(|(_, e)| e.is_live(now))
            .count())
    }
}
