//! Durable on-disk key-value tier
//!
//! A single-file embedded store (SQLite in WAL mode) holding the expansion
//! and LLM-enrichment tiers, which must survive restarts so identical
//! requests return byte-identical cached values. All access goes through
//! `spawn_blocking`; the request path never blocks on the file.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, SearchError};

/// Durable key-value cache backed by a single SQLite file.
#[derive(Clone)]
pub struct DiskCache {
    conn: Arc<Mutex<Connection>>,
}

impl DiskCache {
    /// Open (or create) the cache file and switch it to WAL journaling.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        info!("Disk cache open at {:?}", path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            guard
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()
                .map_err(SearchError::from)
        })
        .await
        .map_err(|e| SearchError::Cache(format!("disk cache task failed: {e}")))?
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            let guard = conn.lock();
            guard
                .execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
                    params![key, value, now],
                )
                .map(|_| ())
                .map_err(SearchError::from)
        })
        .await
        .map_err(|e| SearchError::Cache(format!("disk cache task failed: {e}")))?
    }

    /// Delete every entry whose key starts with `prefix`. Returns the
    /// number of deleted rows.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self.conn.clone();
        // LIKE with escaped wildcards so the prefix is taken literally
        let pattern = format!(
            "{}%",
            prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            guard
                .execute(
                    "DELETE FROM kv WHERE key LIKE ?1 ESCAPE '\\'",
                    params![pattern],
                )
                .map_err(SearchError::from)
        })
        .await
        .map_err(|e| SearchError::Cache(format!("disk cache task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let cache = DiskCache::open_in_memory().unwrap();
        assert_eq!(cache.get("exp:abc").await.unwrap(), None);

        cache.put("exp:abc", r#"["a","b"]"#).await.unwrap();
        assert_eq!(
            cache.get("exp:abc").await.unwrap(),
            Some(r#"["a","b"]"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = DiskCache::open_in_memory().unwrap();
        cache.put("k", "v1").await.unwrap();
        cache.put("k", "v2").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_is_literal() {
        let cache = DiskCache::open_in_memory().unwrap();
        cache.put("exp:a", "1").await.unwrap();
        cache.put("exp:b", "2").await.unwrap();
        cache.put("expX", "3").await.unwrap();

        let deleted = cache.invalidate_prefix("exp:").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(cache.get("expX").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expansions.db");

        {
            let cache = DiskCache::open(&path).unwrap();
            cache.put("exp:k", "payload").await.unwrap();
        }

        let reopened = DiskCache::open(&path).unwrap();
        assert_eq!(
            reopened.get("exp:k").await.unwrap(),
            Some("payload".to_string())
        );
    }
}
