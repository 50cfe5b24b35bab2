//! Storage backend trait definition.
//!
//! [`StorageBackend`] is a minimal key-value interface:
//! - **Keys and values are bytes**: no assumptions about serialization format
//! - **Async by default**: backends may be remote (caches, databases)
//! - **Prefix scans**: enumeration is by key prefix, never by record type
//! - **TTL-aware**: records may carry an expiry the backend enforces
//!
//! Ticket semantics live in the repository layer built on top of this trait,
//! not in the storage backends.
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, types::KeyValue};

/// Abstract storage backend for key-value operations.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and to provide
/// per-key atomicity: a `set` or `delete` on one key is atomic with respect to
/// concurrent readers of that same key. No cross-key transactions are
/// required.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`set_with_ttl`](StorageBackend::set_with_ttl) | Store with automatic expiration |
/// | [`delete`](StorageBackend::delete) | Remove a key, reporting whether it existed |
/// | [`compare_and_set`](StorageBackend::compare_and_set) | Write only if the current value matches |
/// | [`get_prefix`](StorageBackend::get_prefix) | Retrieve every key under a prefix |
/// | [`clear_prefix`](StorageBackend::clear_prefix) | Delete every key under a prefix |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use sso_tickets_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.set(b"key".to_vec(), b"value".to_vec()).await.unwrap();
/// let value = backend.get(b"key").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("value")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists and has not expired
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair, overwriting any existing value.
    ///
    /// Setting a key without a TTL clears any TTL previously attached to it.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Stores a key-value pair that expires after `ttl`.
    ///
    /// Expired keys behave as absent for every read operation. Physical
    /// removal may lag (background cleanup).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if a live value was removed, `Ok(false)` if the key was
    /// absent (or already expired). Deleting an absent key is never an error.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<bool>;

    /// Atomically replaces the value under `key` if its current live value
    /// equals `expected`.
    ///
    /// `expected = None` means "only if absent". The new value carries `ttl`
    /// when given; otherwise any previous TTL is cleared, as with
    /// [`set`](StorageBackend::set).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`](crate::StorageError::Conflict) if the
    /// current value differs from `expected`. Nothing is written in that case.
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<()>;

    /// Retrieves all live key-value pairs whose key starts with `prefix`.
    ///
    /// Results are returned in key order. Backends that cannot enumerate
    /// should return [`StorageError::Unsupported`](crate::StorageError::Unsupported).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>>;

    /// Deletes every key starting with `prefix`, returning how many live
    /// values were removed.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn clear_prefix(&self, prefix: &[u8]) -> StorageResult<usize>;
}
