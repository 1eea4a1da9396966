use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TributaryError};
use crate::store::KvStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| TributaryError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TributaryError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Row ids of a list, most recent first.
    fn list_ids(conn: &Connection, key: &str) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT id FROM list_entries WHERE key = ?1 ORDER BY id DESC")?;
        let ids = stmt
            .query_map(params![key], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;

        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, Self::now_millis()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let conn = self.lock()?;
        let ttl_millis = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at = Self::now_millis().saturating_add(ttl_millis);

        conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO list_entries (key, value, created_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: usize, stop: usize) -> Result<()> {
        let mut conn = self.lock()?;
        let ids = Self::list_ids(&conn, key)?;

        let doomed: Vec<i64> = ids
            .into_iter()
            .enumerate()
            .filter(|(index, _)| *index < start || *index > stop)
            .map(|(_, id)| id)
            .collect();

        if doomed.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM list_entries WHERE id = ?1")?;
            for id in &doomed {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    async fn lrange(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>> {
        if stop < start {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT value FROM list_entries WHERE key = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        )?;

        let limit = (stop - start + 1) as i64;
        let values = stmt
            .query_map(params![key, limit, start as i64], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(values)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![Self::now_millis()],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_ex("k", "v", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_ex("k", "first", 60).await.unwrap();
        store.set_ex("k", "second", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_ex("k", "v", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        let purged = store.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
    }

    #[tokio::test]
    async fn test_purge_keeps_live_entries() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_ex("live", "v", 3600).await.unwrap();
        store.set_ex("dead", "v", 0).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.get("live").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_ex("k", "v", 60).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lpush_lrange_most_recent_first() {
        let store = SqliteStore::in_memory().unwrap();
        for v in ["a", "b", "c"] {
            store.lpush("list", v).await.unwrap();
        }

        let all = store.lrange("list", 0, 10).await.unwrap();
        assert_eq!(all, vec!["c", "b", "a"]);

        let head = store.lrange("list", 0, 1).await.unwrap();
        assert_eq!(head, vec!["c", "b"]);

        let tail = store.lrange("list", 1, 2).await.unwrap();
        assert_eq!(tail, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_ltrim_keeps_window() {
        let store = SqliteStore::in_memory().unwrap();
        for i in 0..5 {
            store.lpush("list", &i.to_string()).await.unwrap();
        }

        store.ltrim("list", 0, 2).await.unwrap();
        let remaining = store.lrange("list", 0, 10).await.unwrap();
        assert_eq!(remaining, vec!["4", "3", "2"]);
    }

    #[tokio::test]
    async fn test_lists_are_isolated_by_key() {
        let store = SqliteStore::in_memory().unwrap();
        store.lpush("a", "1").await.unwrap();
        store.lpush("b", "2").await.unwrap();
        store.ltrim("a", 0, 0).await.unwrap();

        assert_eq!(store.lrange("a", 0, 5).await.unwrap(), vec!["1"]);
        assert_eq!(store.lrange("b", 0, 5).await.unwrap(), vec!["2"]);
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.set_ex("k", "persisted", 3600).await.unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(
            reopened.get("k").await.unwrap(),
            Some("persisted".to_string())
        );
    }

    #[test]
    fn test_delete_without_runtime_attribute() {
        let store = SqliteStore::in_memory().unwrap();
        tokio_test::block_on(async {
            tokio_test::assert_ok!(store.set_ex("k", "v", 60).await);
            tokio_test::assert_ok!(store.delete("k").await);
            assert_eq!(tokio_test::assert_ok!(store.get("k").await), None);
        });
    }
}
