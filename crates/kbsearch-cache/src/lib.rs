#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Query result cache.
//!
//! [`ResultCache`] stores serialized ranked lists under
//! `query:<hash>:top_k:<k>` with a TTL and a companion `<key>:meta` hit
//! counter. It never surfaces backend failures: a broken backend reads as a
//! miss and writes report `false`.
//!
//! Backends: [`MemoryCacheBackend`] for a single process and
//! [`SqliteCacheBackend`] for a cache shared across processes and restarts.

pub mod backend;
pub mod error;
pub mod key;
pub mod memory;
pub mod result_cache;
pub mod sqlite;

use std::sync::Arc;

use kbsearch_core::config::{expand_path, CacheBackendKind, CacheSettings};

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::{cache_key, meta_key, normalize};
pub use memory::MemoryCacheBackend;
pub use result_cache::{CacheStats, Invalidation, ResultCache};
pub use sqlite::SqliteCacheBackend;

/// Backend selected by `cache.backend`.
pub fn open_backend(settings: &CacheSettings) -> Result<Arc<dyn CacheBackend>, CacheError> {
    match settings.backend {
        CacheBackendKind::Memory => Ok(Arc::new(MemoryCacheBackend::new())),
        CacheBackendKind::Sqlite => {
            let path = expand_path(&settings.path);
            tracing::info!(path = %path.display(), "opening sqlite result cache");
            Ok(Arc::new(SqliteCacheBackend::open(&path)?))
        }
    }
}
