//! Typed JSON access to a key value store.
//!
//! Every operation is one round trip: the value is encoded to JSON before a
//! write, and decoded into the caller's type after a read. Failures are
//! reported as [`KvjsonError`] carrying the key (and field) involved.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::{Client, Store};
use crate::common::{debug, info, warn};
use crate::config::Config;
use crate::error::{KvjsonError, StoreError, Target};
use crate::Result;

const UNCONNECTED: &str = "<unconnected>";
const INJECTED: &str = "<injected>";

pub struct KvFacade<S = Client> {
    // `None` only for a facade that never connected.
    store: Option<S>,
    // Store description for error messages, without credentials.
    target: String,
    request_timeout: Option<Duration>,
}

impl KvFacade<Client> {
    /// Connect to the store described by `config` and probe it.
    ///
    /// The whole sequence (tcp connect, `AUTH`, `SELECT`, `PING`) runs under
    /// the connect timeout.
    pub async fn connect(config: &Config) -> Result<Self> {
        let target = config.store();

        let connect = async {
            let mut options = target.connect_options()?;
            options.buffer_bytes = Some(config.connection_buffer_bytes());

            let client = Client::connect(&options).await?;
            client.ping().await?;
            Ok::<_, StoreError>(client)
        };

        let client = match tokio::time::timeout(config.connect_timeout(), connect).await {
            Ok(Ok(client)) => client,
            Ok(Err(cause)) => return Err(connection_error(target.to_string(), cause)),
            Err(elapsed) => return Err(connection_error(target.to_string(), elapsed.into())),
        };

        info!(%target, "Store ready");

        Ok(KvFacade {
            store: Some(client),
            target: target.to_string(),
            request_timeout: config.request_timeout(),
        })
    }
}

fn connection_error(target: String, cause: StoreError) -> KvjsonError {
    KvjsonError::Connection {
        target,
        cause: Some(cause),
    }
}

impl<S> KvFacade<S> {
    /// Facade without a store. It is never ready and every operation fails
    /// with a connection error.
    pub fn unconnected() -> Self {
        Self {
            store: None,
            target: UNCONNECTED.to_owned(),
            request_timeout: None,
        }
    }

    /// Deadline for each store round trip. `None` waits for the store.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl<S> KvFacade<S>
where
    S: Store,
{
    /// Wrap an already connected store.
    pub fn new(store: S) -> Self {
        Self {
            store: Some(store),
            target: INJECTED.to_owned(),
            request_timeout: None,
        }
    }

    /// Wrap `store` after checking it answers a ping.
    pub async fn from_store(store: S) -> Result<Self> {
        if let Err(cause) = store.ping().await {
            return Err(connection_error(INJECTED.to_owned(), cause));
        }
        Ok(KvFacade::new(store))
    }

    /// Liveness probe returning the round trip latency.
    pub async fn ping(&self) -> Result<chrono::Duration> {
        let store = self.store.as_ref().ok_or_else(|| self.not_connected())?;

        self.call(store.ping())
            .await
            .map_err(|cause| connection_error(self.target.clone(), cause))
    }

    /// Health check. Never fails, a broken or missing connection reads as `false`.
    pub async fn is_ready(&self) -> bool {
        if self.store.is_none() {
            return false;
        }

        match self.ping().await {
            Ok(latency) => {
                debug!(latency_ms = latency.num_milliseconds(), "Store ping");
                true
            }
            Err(err) => {
                warn!(cause = %err, "Store not ready");
                false
            }
        }
    }

    /// Decode the JSON value stored at `key`.
    pub async fn get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let target = Target::key(key);
        let store = self.connected(&target)?;

        match self.call(store.get(key)).await {
            Ok(Some(raw)) => decode(target, &raw),
            Ok(None) => Err(KvjsonError::NotFound {
                target,
                cause: None,
            }),
            Err(cause) => Err(read_failure(target, cause)),
        }
    }

    /// Store `value` as JSON at `key`, replacing the value and its expiration.
    ///
    /// A `ttl` of `None` or zero stores without expiration.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let target = Target::key(key);
        let store = self.connected(&target)?;
        let payload = encode(&target, value)?;

        self.call(store.set(key, payload, ttl))
            .await
            .map_err(|cause| KvjsonError::Write { target, cause })
    }

    /// Remove `key`. Removing a missing key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let target = Target::key(key);
        let store = self.connected(&target)?;

        let removed = self
            .call(store.delete(key))
            .await
            .map_err(|cause| KvjsonError::Delete { target, cause })?;
        debug!(key, removed, "Delete");

        Ok(())
    }

    /// Raw JSON text of every field in `table`.
    ///
    /// A missing table is an empty map. A store failure is reported as
    /// `NotFound` with the failure as its cause.
    pub async fn get_all_hash_fields(&self, table: &str) -> Result<HashMap<String, String>> {
        let target = Target::key(table);
        let store = self.connected(&target)?;

        let fields = self
            .call(store.hgetall(table))
            .await
            .map_err(|cause| read_failure(target, cause))?;

        fields
            .into_iter()
            .map(|(field, raw)| {
                let text = decode_text(Target::field(table, field.as_str()), raw)?;
                Ok((field, text))
            })
            .collect()
    }

    pub async fn get_hash_field<T>(&self, table: &str, field: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let target = Target::field(table, field);
        let store = self.connected(&target)?;

        match self.call(store.hget(table, field)).await {
            Ok(Some(raw)) => decode(target, &raw),
            Ok(None) => Err(KvjsonError::NotFound {
                target,
                cause: None,
            }),
            Err(cause) => Err(read_failure(target, cause)),
        }
    }

    /// Store `value` as JSON in `field` of `table`. Other fields are untouched.
    pub async fn set_hash_field<T>(&self, table: &str, field: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let target = Target::field(table, field);
        let store = self.connected(&target)?;
        let payload = encode(&target, value)?;

        self.call(store.hset(table, field, payload))
            .await
            .map_err(|cause| KvjsonError::Write { target, cause })
    }

    /// Remove `field` from `table`. Removing a missing field succeeds.
    pub async fn delete_hash_field(&self, table: &str, field: &str) -> Result<()> {
        let target = Target::field(table, field);
        let store = self.connected(&target)?;

        let removed = self
            .call(store.hdelete(table, field))
            .await
            .map_err(|cause| KvjsonError::Delete { target, cause })?;
        debug!(table, field, removed, "Delete field");

        Ok(())
    }

    // Validate the target and borrow the store.
    fn connected(&self, target: &Target) -> Result<&S> {
        let empty_field = target.field.as_deref().map_or(false, str::is_empty);
        if target.entity.is_empty() || empty_field {
            return Err(KvjsonError::InvalidKey {
                target: target.clone(),
            });
        }

        self.store.as_ref().ok_or_else(|| self.not_connected())
    }

    fn not_connected(&self) -> KvjsonError {
        KvjsonError::Connection {
            target: self.target.clone(),
            cause: None,
        }
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, request).await?,
            None => request.await,
        }
    }
}

fn encode<T>(target: &Target, value: &T) -> Result<Bytes>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|cause| KvjsonError::Encode {
            target: target.clone(),
            cause,
        })
}

fn decode<T>(target: Target, raw: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(raw).map_err(|cause| KvjsonError::Decode {
        target,
        raw: String::from_utf8_lossy(raw).into_owned(),
        cause,
    })
}

// Bytes that are not UTF-8 are not JSON text either.
fn decode_text(target: Target, raw: Bytes) -> Result<String> {
    match String::from_utf8(raw.to_vec()) {
        Ok(text) => Ok(text),
        Err(_) => decode::<serde_json::Value>(target, &raw).map(|value| value.to_string()),
    }
}

// Store failures on read surface as NotFound, keeping the failure as cause.
fn read_failure(target: Target, cause: StoreError) -> KvjsonError {
    warn!(%target, cause = %cause, "Read failed, reporting not found");
    KvjsonError::NotFound {
        target,
        cause: Some(cause),
    }
}
