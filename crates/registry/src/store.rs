//! Raw record primitives that back a ticket registry.
//!
//! A [`TicketStore`] holds [`StoredTicket`] records keyed by the id the codec
//! produced (plaintext or digest). It knows nothing about the ticket
//! hierarchy; the registry layers lookups, cascading deletion and counting on
//! top of these primitives.
//!
//! Two stores ship with the crate:
//!
//! - [`MemoryTicketStore`] - a hash map, for tests and single-node use
//! - [`KvTicketStore`] - JSON records over any [`StorageBackend`]

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::RwLock;
use sso_tickets_storage::{StorageBackend, StorageError, StorageResult};
use tracing::debug;

use crate::codec::StoredTicket;

/// Default key prefix for records written by [`KvTicketStore`].
pub const DEFAULT_KEY_PREFIX: &str = "tickets/";

/// Compare-and-set rounds [`KvTicketStore::replace`] attempts before giving
/// up with [`StorageError::Conflict`].
const MAX_REPLACE_ATTEMPTS: usize = 8;

/// Persistence primitives for stored ticket records.
///
/// Per-key atomicity is the implementation's responsibility; there is no
/// cross-key locking anywhere above this trait.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Fetches the record stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))` if the record exists
    /// - `Ok(None)` if it doesn't
    /// - `Err(...)` on storage errors
    async fn get(&self, key: &str) -> StorageResult<Option<StoredTicket>>;

    /// Stores `record` under its [`storage_id`](StoredTicket::storage_id),
    /// replacing any previous record.
    ///
    /// `ttl` is a hint: stores that support expiry may drop the record once
    /// it elapses, others ignore it.
    async fn put(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<()>;

    /// Stores `record` only if a record already exists under its
    /// [`storage_id`](StoredTicket::storage_id).
    ///
    /// Returns `false`, writing nothing, when the record is absent. The check
    /// and the write are atomic for that key, so a record removed
    /// concurrently is never recreated.
    async fn replace(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<bool>;

    /// Removes the record under `key`. Returns `true` if a record existed.
    async fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Returns every stored record, in no particular order.
    ///
    /// # Errors
    ///
    /// The default implementation returns [`StorageError::Unsupported`].
    /// Stores that cannot enumerate should keep it.
    async fn list_all(&self) -> StorageResult<Vec<StoredTicket>> {
        Err(StorageError::unsupported("list_all"))
    }

    /// Removes every record. Returns the number removed.
    async fn clear(&self) -> StorageResult<usize>;
}

#[async_trait]
impl<S: TicketStore + ?Sized> TicketStore for Arc<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<StoredTicket>> {
        (**self).get(key).await
    }

    async fn put(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<()> {
        (**self).put(record, ttl).await
    }

    async fn replace(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<bool> {
        (**self).replace(record, ttl).await
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        (**self).remove(key).await
    }

    async fn list_all(&self) -> StorageResult<Vec<StoredTicket>> {
        (**self).list_all().await
    }

    async fn clear(&self) -> StorageResult<usize> {
        (**self).clear().await
    }
}

/// In-memory [`TicketStore`].
///
/// Ignores TTL hints; expired tickets stay until the registry cleaner or a
/// delete removes them. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryTicketStore {
    records: Arc<RwLock<HashMap<String, StoredTicket>>>,
}

impl MemoryTicketStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<Option<StoredTicket>> {
        Ok(self.records.read().get(key).cloned())
    }

    #[tracing::instrument(skip_all, fields(key = %record.storage_id()))]
    async fn put(&self, record: StoredTicket, _ttl: Option<Duration>) -> StorageResult<()> {
        self.records.write().insert(record.storage_id().to_owned(), record);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key = %record.storage_id()))]
    async fn replace(&self, record: StoredTicket, _ttl: Option<Duration>) -> StorageResult<bool> {
        let mut records = self.records.write();
        match records.get_mut(record.storage_id()) {
            Some(slot) => {
                *slot = record;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    #[tracing::instrument(skip(self))]
    async fn list_all(&self) -> StorageResult<Vec<StoredTicket>> {
        Ok(self.records.read().values().cloned().collect())
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> StorageResult<usize> {
        let mut records = self.records.write();
        let count = records.len();
        records.clear();
        Ok(count)
    }
}

/// [`TicketStore`] over a byte-level [`StorageBackend`].
///
/// Records are serialized as JSON and stored under `{key_prefix}{key}`.
/// TTL hints are forwarded to [`StorageBackend::set_with_ttl`], and
/// enumeration is a prefix scan, so several registries can share one backend
/// under different prefixes.
///
/// # Examples
///
/// ```
/// use sso_tickets_registry::KvTicketStore;
/// use sso_tickets_storage::MemoryBackend;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = KvTicketStore::new(MemoryBackend::new(), "sso/tickets/");
/// assert_eq!(store.key_prefix(), "sso/tickets/");
/// # }
/// ```
#[derive(Clone)]
pub struct KvTicketStore<B> {
    backend: B,
    key_prefix: String,
}

impl<B: StorageBackend> KvTicketStore<B> {
    pub fn new(backend: B, key_prefix: impl Into<String>) -> Self {
        Self { backend, key_prefix: key_prefix.into() }
    }

    /// Creates a store using [`DEFAULT_KEY_PREFIX`].
    pub fn with_default_prefix(backend: B) -> Self {
        Self::new(backend, DEFAULT_KEY_PREFIX)
    }

    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn storage_key(&self, key: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.key_prefix.len() + key.len());
        out.extend_from_slice(self.key_prefix.as_bytes());
        out.extend_from_slice(key.as_bytes());
        out
    }

    fn encode(record: &StoredTicket) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(record)
            .map_err(|e| StorageError::serialization_with_source("stored ticket record", e))
    }

    fn decode(bytes: &[u8]) -> StorageResult<StoredTicket> {
        serde_json::from_slice(bytes)
            .map_err(|e| StorageError::serialization_with_source("stored ticket record", e))
    }
}

impl<B> fmt::Debug for KvTicketStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvTicketStore").field("key_prefix", &self.key_prefix).finish_non_exhaustive()
    }
}

#[async_trait]
impl<B: StorageBackend> TicketStore for KvTicketStore<B> {
    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<Option<StoredTicket>> {
        match self.backend.get(&self.storage_key(key)).await? {
            Some(bytes) => Self::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip_all, fields(key = %record.storage_id(), ttl = ?ttl))]
    async fn put(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<()> {
        let key = self.storage_key(record.storage_id());
        let value = Self::encode(&record)?;
        match ttl {
            Some(ttl) => self.backend.set_with_ttl(key, value, ttl).await,
            None => self.backend.set(key, value).await,
        }
    }

    #[tracing::instrument(skip_all, fields(key = %record.storage_id(), ttl = ?ttl))]
    async fn replace(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<bool> {
        let key = self.storage_key(record.storage_id());
        let value = Self::encode(&record)?;
        for _ in 0..MAX_REPLACE_ATTEMPTS {
            let Some(current) = self.backend.get(&key).await? else {
                return Ok(false);
            };
            let swapped =
                self.backend.compare_and_set(&key, Some(&current[..]), value.clone(), ttl).await;
            match swapped {
                Ok(()) => return Ok(true),
                Err(StorageError::Conflict) => {
                    debug!("Record changed during replace, retrying");
                },
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::conflict())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, key: &str) -> StorageResult<bool> {
        self.backend.delete(&self.storage_key(key)).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_all(&self) -> StorageResult<Vec<StoredTicket>> {
        self.backend
            .get_prefix(self.key_prefix.as_bytes())
            .await?
            .iter()
            .map(|kv| Self::decode(&kv.value))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> StorageResult<usize> {
        self.backend.clear_prefix(self.key_prefix.as_bytes()).await
    }
}
