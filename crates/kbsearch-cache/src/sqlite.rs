//! SQLite-backed [`CacheBackend`]. Entries survive restarts and are shared by
//! every process that opens the same file.
//!
//! Expiry is stored as unix milliseconds. Expired rows are invisible to reads
//! and are deleted on every write, scan and delete.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::compile_pattern;
use crate::{CacheBackend, CacheError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);
";

/// One connection behind an async mutex; statements are short.
pub struct SqliteCacheBackend {
    conn: Mutex<Connection>,
}

fn backend_err(e: rusqlite::Error) -> CacheError {
    CacheError::Backend(e.to_string())
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn expires_at(ttl: Duration) -> i64 {
    now_ms().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

fn purge(conn: &Connection) -> Result<usize, CacheError> {
    let n = conn
        .execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now_ms()])
        .map_err(backend_err)?;
    if n > 0 {
        debug!(purged = n, "removed expired cache rows");
    }
    Ok(n)
}

impl SqliteCacheBackend {
    /// Open (or create) the cache database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )
        .map_err(backend_err)?;
        conn.execute_batch(SCHEMA).map_err(backend_err)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Delete expired rows now; returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock().await;
        purge(&conn)
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn ping(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
            params![key, now_ms()],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend_err)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let conn = self.conn.lock().await;
        purge(&conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expires_at(ttl)],
        )
        .map_err(backend_err)?;
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().map_err(backend_err)?;
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now_ms()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend_err)?;
        let Some(current) = current else {
            return Ok(None);
        };
        let current: i64 = current.parse().map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
        let next = current.saturating_add(by);
        tx.execute("UPDATE cache_entries SET value = ?2 WHERE key = ?1", params![key, next.to_string()])
            .map_err(backend_err)?;
        tx.commit().map_err(backend_err)?;
        Ok(Some(next))
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matcher = compile_pattern(pattern)?;
        let conn = self.conn.lock().await;
        purge(&conn)?;
        let mut stmt = conn
            .prepare("SELECT key FROM cache_entries ORDER BY key")
            .map_err(backend_err)?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(backend_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend_err)?;
        Ok(keys.into_iter().filter(|k| matcher.matches(k)).collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        let mut conn = self.conn.lock().await;
        purge(&conn)?;
        let tx = conn.transaction().map_err(backend_err)?;
        let mut deleted = 0;
        for key in keys {
            deleted += tx
                .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                .map_err(backend_err)?;
        }
        tx.commit().map_err(backend_err)?;
        Ok(deleted)
    }
}
