use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

use crate::client::Store;
use crate::error::{StoreError, StoreErrorKind};

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

enum Entry {
    Scalar {
        value: Bytes,
        expires_at: Option<Instant>,
    },
    Hash(HashMap<String, Bytes>),
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            Entry::Scalar {
                expires_at: Some(at),
                ..
            } => *at <= now,
            _ => false,
        }
    }
}

/// Process local store.
///
/// Follows the store semantics the facade relies on: last write wins, a write
/// replaces the expiration, scalar and hash commands reject each other's keys.
/// Can be switched offline to emulate an unreachable server.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every command fails with a connection refused io error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reachable(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "store offline").into());
        }
        Ok(())
    }

    // Lock the entries after dropping `key` if it has expired.
    fn live_entries(&self, key: &str) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.reachable()?;

        let mut entries = self.entries();
        if entries
            .get(key)
            .map(|entry| entry.is_expired(Instant::now()))
            .unwrap_or(false)
        {
            entries.remove(key);
        }
        Ok(entries)
    }
}

fn wrong_type() -> StoreError {
    StoreErrorKind::Server(WRONGTYPE.into()).into()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<chrono::Duration, StoreError> {
        let start = chrono::Utc::now();
        self.reachable()?;
        Ok(chrono::Utc::now() - start)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.live_entries(key)?.get(key) {
            Some(Entry::Scalar { value, .. }) => Ok(Some(value.clone())),
            Some(Entry::Hash(_)) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .map(|ttl| Instant::now() + ttl);

        self.live_entries(key)?
            .insert(key.to_owned(), Entry::Scalar { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.live_entries(key)?.remove(key).map_or(0, |_| 1))
    }

    async fn hgetall(&self, table: &str) -> Result<HashMap<String, Bytes>, StoreError> {
        match self.live_entries(table)?.get(table) {
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            Some(Entry::Scalar { .. }) => Err(wrong_type()),
            None => Ok(HashMap::new()),
        }
    }

    async fn hget(&self, table: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        match self.live_entries(table)?.get(table) {
            Some(Entry::Hash(fields)) => Ok(fields.get(field).cloned()),
            Some(Entry::Scalar { .. }) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    async fn hset(&self, table: &str, field: &str, value: Bytes) -> Result<(), StoreError> {
        let mut entries = self.live_entries(table)?;
        let entry = entries
            .entry(table.to_owned())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(fields) => {
                fields.insert(field.to_owned(), value);
                Ok(())
            }
            Entry::Scalar { .. } => Err(wrong_type()),
        }
    }

    async fn hdelete(&self, table: &str, field: &str) -> Result<u64, StoreError> {
        let mut entries = self.live_entries(table)?;
        let (removed, now_empty) = match entries.get_mut(table) {
            Some(Entry::Hash(fields)) => (fields.remove(field).is_some(), fields.is_empty()),
            Some(Entry::Scalar { .. }) => return Err(wrong_type()),
            None => return Ok(0),
        };
        // Hash without fields does not exist.
        if now_empty {
            entries.remove(table);
        }
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_expires_and_is_replaced_by_plain_write() {
        tokio_test::block_on(async move {
            let store = MemoryStore::new();

            store
                .set("k", Bytes::from_static(b"1"), Some(Duration::from_millis(20)))
                .await
                .unwrap();
            assert!(store.get("k").await.unwrap().is_some());
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(store.get("k").await.unwrap(), None);

            store
                .set("k", Bytes::from_static(b"1"), Some(Duration::from_millis(20)))
                .await
                .unwrap();
            store.set("k", Bytes::from_static(b"2"), None).await.unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"2")));
        })
    }

    #[test]
    fn wrong_type_is_server_error() {
        tokio_test::block_on(async move {
            let store = MemoryStore::new();
            store.set("k", Bytes::from_static(b"1"), None).await.unwrap();
            store.hset("t", "f", Bytes::from_static(b"1")).await.unwrap();

            assert!(store.hget("k", "f").await.unwrap_err().is_server());
            assert!(store.hgetall("k").await.unwrap_err().is_server());
            assert!(store.get("t").await.unwrap_err().is_server());
            assert!(store
                .hset("k", "f", Bytes::from_static(b"1"))
                .await
                .unwrap_err()
                .is_server());
        })
    }

    #[test]
    fn delete_counts() {
        tokio_test::block_on(async move {
            let store = MemoryStore::new();
            store.hset("t", "f1", Bytes::from_static(b"1")).await.unwrap();

            assert_eq!(store.hdelete("t", "f2").await.unwrap(), 0);
            assert_eq!(store.hdelete("t", "f1").await.unwrap(), 1);
            assert!(store.is_empty());
            assert_eq!(store.delete("t").await.unwrap(), 0);
        })
    }

    #[test]
    fn offline() {
        tokio_test::block_on(async move {
            let store = MemoryStore::new();
            store.set_offline(true);

            let err = store.ping().await.unwrap_err();
            assert!(matches!(err.kind(), StoreErrorKind::Io(_)));
            assert!(store.get("k").await.is_err());

            store.set_offline(false);
            assert!(store.ping().await.is_ok());
        })
    }
}
