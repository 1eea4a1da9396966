pub mod sqlite;

use async_trait::async_trait;

use crate::app::Result;

pub use sqlite::SqliteStore;

/// TTL-capable key-value store with list primitives.
///
/// List indices count from the most recently pushed element (index 0), and
/// ranges are inclusive on both ends.
#[async_trait]
pub trait KvStore: Send + Sync {
    // Key-value operations
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;

    // List operations
    async fn lpush(&self, key: &str, value: &str) -> Result<()>;
    async fn ltrim(&self, key: &str, start: usize, stop: usize) -> Result<()>;
    async fn lrange(&self, key: &str, start: usize, stop: usize) -> Result<Vec<String>>;

    // Housekeeping
    async fn purge_expired(&self) -> Result<usize>;
}
