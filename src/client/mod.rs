use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub mod memory;
pub mod tcp;

pub use memory::MemoryStore;
pub use tcp::{Client, ConnectOptions};

/// Primitive commands of a key value store.
///
/// Implementations must be usable from many tasks at once.
#[async_trait]
pub trait Store: Send + Sync {
    /// Liveness probe. Returns round trip latency.
    async fn ping(&self) -> Result<chrono::Duration, StoreError>;
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;
    /// Overwrite `key`. The expiration is replaced by `ttl`, `None` clears it.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError>;
    /// Returns the number of removed keys.
    async fn delete(&self, key: &str) -> Result<u64, StoreError>;
    async fn hgetall(&self, table: &str) -> Result<HashMap<String, Bytes>, StoreError>;
    async fn hget(&self, table: &str, field: &str) -> Result<Option<Bytes>, StoreError>;
    async fn hset(&self, table: &str, field: &str, value: Bytes) -> Result<(), StoreError>;
    /// Returns the number of removed fields.
    async fn hdelete(&self, table: &str, field: &str) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn ping(&self) -> Result<chrono::Duration, StoreError> {
        (**self).ping().await
    }
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        (**self).set(key, value, ttl).await
    }
    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        (**self).delete(key).await
    }
    async fn hgetall(&self, table: &str) -> Result<HashMap<String, Bytes>, StoreError> {
        (**self).hgetall(table).await
    }
    async fn hget(&self, table: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        (**self).hget(table, field).await
    }
    async fn hset(&self, table: &str, field: &str, value: Bytes) -> Result<(), StoreError> {
        (**self).hset(table, field, value).await
    }
    async fn hdelete(&self, table: &str, field: &str) -> Result<u64, StoreError> {
        (**self).hdelete(table, field).await
    }
}
