//! Typed adapter over an external key-value cache.
//!
//! Values are stored as JSON bytes with a sliding expiration. `update` is a
//! plain read-modify-write: it is **not** atomic, and a concurrent `update` on
//! the same key that interleaves between the read and the write is silently
//! overwritten (last writer wins). Call sites that cannot tolerate a lost
//! update must hold the room's keyed lock.

mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("payload codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("backend failed: {0}")]
    Backend(String),
}

/// Byte-oriented cache the adapter runs against
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch a live entry, refreshing its sliding expiration
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Fetch a live entry without touching its expiration
    async fn peek(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Live keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Key layout shared by every component
pub mod keys {
    pub const ROOM_PREFIX: &str = "game/room/";

    pub fn room(room_id: &str) -> String {
        format!("{}{}", ROOM_PREFIX, room_id)
    }

    pub fn passphrase(passphrase: &str) -> String {
        format!("game/passphrase/{}", passphrase)
    }

    pub fn user_room(player_id: &str) -> String {
        format!("user/{}/room", player_id)
    }

    pub fn room_id_from_key(key: &str) -> Option<&str> {
        key.strip_prefix(ROOM_PREFIX)
    }
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
}

impl Store {
    pub fn new(backend: Arc<dyn KvBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Like `get`, but a periodic reader does not keep an idle room alive
    pub async fn peek<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.backend.peek(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.set(key, bytes, self.ttl).await
    }

    /// Read the value under `key`, apply `mutate`, write it back and return it.
    ///
    /// Fails with `NotFound` when the key is absent. If `mutate` returns an
    /// error nothing is written.
    pub async fn update<T, E, F>(&self, key: &str, mutate: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnOnce(&mut T) -> Result<(), E>,
    {
        let mut value: T = self
            .get(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        mutate(&mut value)?;
        self.set(key, &value).await?;
        Ok(value)
    }

    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.backend.delete(key).await
    }

    pub async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.backend.keys_with_prefix(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        hits: u32,
    }

    fn store() -> Store {
        Store::in_memory(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = store();
        let value: Option<Counter> = store.get("nope").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_update_applies_and_persists() {
        let store = store();
        store.set("c", &Counter { hits: 1 }).await.unwrap();

        let updated: Counter = store
            .update::<Counter, StoreError, _>("c", |c| {
                c.hits += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(updated, Counter { hits: 2 });
        assert_eq!(store.get::<Counter>("c").await.unwrap(), Some(Counter { hits: 2 }));
    }

    #[tokio::test]
    async fn test_update_missing_key_is_not_found() {
        let store = store();
        let result = store
            .update::<Counter, StoreError, _>("missing", |_| Ok(()))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(ref k)) if k == "missing"));
    }

    #[tokio::test]
    async fn test_failed_mutation_writes_nothing() {
        let store = store();
        store.set("c", &Counter { hits: 1 }).await.unwrap();

        let result = store
            .update::<Counter, StoreError, _>("c", |c| {
                c.hits = 99;
                Err(StoreError::Backend("rejected".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.get::<Counter>("c").await.unwrap(), Some(Counter { hits: 1 }));
    }

    #[tokio::test]
    async fn test_interleaved_updates_last_writer_wins() {
        let store = store();
        store.set("c", &Counter { hits: 0 }).await.unwrap();

        // Two writers read the same snapshot; the later set discards the earlier one
        let first: Counter = store.get("c").await.unwrap().unwrap();
        let second: Counter = store.get("c").await.unwrap().unwrap();
        store.set("c", &Counter { hits: first.hits + 1 }).await.unwrap();
        store.set("c", &Counter { hits: second.hits + 10 }).await.unwrap();

        assert_eq!(store.get::<Counter>("c").await.unwrap(), Some(Counter { hits: 10 }));
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(keys::room("abc"), "game/room/abc");
        assert_eq!(keys::room_id_from_key("game/room/abc"), Some("abc"));
        assert_eq!(keys::room_id_from_key("user/abc/room"), None);
        assert_eq!(keys::user_room("p1"), "user/p1/room");
    }
}
