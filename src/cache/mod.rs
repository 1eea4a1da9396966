//! Best-effort memoization over a [`KvStore`].
//!
//! Nothing in here fails the caller's request: store errors and malformed
//! payloads are logged and read as misses. The only error surfaced is an
//! attempt to cache a `null` value.

pub mod keys;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::app::{Result, TributaryError};
use crate::domain::ChatEntry;
use crate::store::KvStore;

/// Lifetime of every cached value, in seconds.
pub const CACHE_TTL_SECS: u64 = 3600;
/// Chat turns kept per conversation.
pub const CHAT_HISTORY_CAP: usize = 50;
/// Turns returned by [`Cache::recent_chat`] when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KvStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match decode(&raw) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, CACHE_TTL_SECS).await
    }

    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<()> {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping cache write for {}: {}", key, e);
                return Ok(());
            }
        };

        if value.is_null() {
            return Err(TributaryError::InvalidInput(format!(
                "refusing to cache a null value under {}",
                key
            )));
        }

        if let Err(e) = self.store.set_ex(key, &value.to_string(), ttl_secs).await {
            warn!("Cache write failed for {}: {}", key, e);
        }

        Ok(())
    }

    /// Record a chat turn at the head of the conversation's history.
    pub async fn push_chat(&self, conversation_id: &str, entry: &ChatEntry) {
        let key = keys::chat_history_key(conversation_id);

        let payload = match serde_json::to_string(entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize chat entry for {}: {}", conversation_id, e);
                return;
            }
        };

        if let Err(e) = self.store.lpush(&key, &payload).await {
            warn!("Failed to append chat history for {}: {}", conversation_id, e);
            return;
        }

        if let Err(e) = self.store.ltrim(&key, 0, CHAT_HISTORY_CAP - 1).await {
            warn!("Failed to trim chat history for {}: {}", conversation_id, e);
        }
    }

    /// Up to `limit` most recent turns, newest first. Unreadable turns are skipped.
    pub async fn recent_chat(&self, conversation_id: &str, limit: usize) -> Vec<ChatEntry> {
        if limit == 0 {
            return Vec::new();
        }

        let key = keys::chat_history_key(conversation_id);
        let raw = match self.store.lrange(&key, 0, limit - 1).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read chat history for {}: {}", conversation_id, e);
                return Vec::new();
            }
        };

        raw.iter()
            .filter_map(|item| match serde_json::from_str::<ChatEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable chat entry for {}: {}", conversation_id, e);
                    None
                }
            })
            .collect()
    }

    pub async fn purge_expired(&self) -> usize {
        match self.store.purge_expired().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Cache purge failed: {}", e);
                0
            }
        }
    }
}

/// Accepts either a JSON document or a JSON string wrapping one.
fn decode<T: DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    let value: Value = serde_json::from_str(raw)?;
    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(e) => match value {
            Value::String(inner) => serde_json::from_str(&inner),
            _ => Err(e),
        },
    }
}
