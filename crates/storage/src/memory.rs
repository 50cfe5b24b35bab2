//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] suitable for testing, development and single-node
//! deployments.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Ordered storage**: Keys are stored in a [`BTreeMap`] for efficient prefix scans
//! - **TTL support**: Background task cleans up expired keys
//!
//! # Example
//!
//! ```
//! use sso_tickets_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - TTL cleanup runs every second, so physical removal is not precise (reads
//!   are: an expired key is never returned)

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::{select, sync::watch, time::sleep};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::KeyValue,
};

/// Interval between background TTL sweeps.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the cleanup task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // Sending is a best-effort signal; the receiver may already be gone.
        let _ = self.shutdown_tx.send(());
    }
}

/// In-memory storage backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
///
/// # Shutdown
///
/// The background TTL cleanup task stops automatically when all clones of
/// the `MemoryBackend` are dropped. [`shutdown`](Self::shutdown) stops it
/// explicitly.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
    ttl_data: Arc<RwLock<BTreeMap<Vec<u8>, Instant>>>,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl MemoryBackend {
    /// Creates a new in-memory storage backend.
    ///
    /// Spawns a background task on the current tokio runtime that
    /// periodically removes expired keys.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let backend = Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            ttl_data: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task holds only the shared maps, not the guard, so dropping the
        // last handle closes the channel.
        let data = Arc::clone(&backend.data);
        let ttl_data = Arc::clone(&backend.ttl_data);
        tokio::spawn(async move {
            cleanup_expired_keys(data, ttl_data, shutdown_rx).await;
        });

        backend
    }

    /// Explicitly signals the background TTL cleanup task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Returns the number of keys currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn is_expired(ttl_data: &BTreeMap<Vec<u8>, Instant>, key: &[u8], now: Instant) -> bool {
        ttl_data.get(key).is_some_and(|expiry| *expiry <= now)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweeps expired keys every [`CLEANUP_INTERVAL`] until shutdown.
async fn cleanup_expired_keys(
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
    ttl_data: Arc<RwLock<BTreeMap<Vec<u8>, Instant>>>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    loop {
        select! {
            _ = sleep(CLEANUP_INTERVAL) => {}
            _ = shutdown_rx.changed() => {
                return;
            }
        }

        let now = Instant::now();
        let expired_keys: Vec<Vec<u8>> = ttl_data
            .read()
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(key, _)| key.clone())
            .collect();

        if expired_keys.is_empty() {
            continue;
        }

        // Lock order: data → ttl_data, same as every writer.
        let mut data_guard = data.write();
        let mut ttl_guard = ttl_data.write();
        for key in &expired_keys {
            data_guard.remove(key);
            ttl_guard.remove(key);
        }
        tracing::trace!(count = expired_keys.len(), "Removed expired keys");
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let data = self.data.read();
        let ttl_data = self.ttl_data.read();
        if Self::is_expired(&ttl_data, key, Instant::now()) {
            return Ok(None);
        }
        Ok(data.get(key).cloned())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len(), value_len = value.len()))]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        ttl_data.remove(&key);
        data.insert(key, Bytes::from(value));
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len(), ttl_ms = ttl.as_millis() as u64))]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        ttl_data.insert(key.clone(), Instant::now() + ttl);
        data.insert(key, Bytes::from(value));
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len()))]
    async fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        let expired = Self::is_expired(&ttl_data, key, Instant::now());
        ttl_data.remove(key);
        let existed = data.remove(key).is_some();
        Ok(existed && !expired)
    }

    #[tracing::instrument(skip_all, fields(key_len = key.len(), expected = expected.is_some()))]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        let now = Instant::now();

        let current =
            if Self::is_expired(&ttl_data, key, now) { None } else { data.get(key) };
        let matches = match (expected, current) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == &cur[..],
            _ => false,
        };
        if !matches {
            return Err(StorageError::Conflict);
        }

        match ttl {
            Some(ttl) => ttl_data.insert(key.to_vec(), now + ttl),
            None => ttl_data.remove(key),
        };
        data.insert(key.to_vec(), Bytes::from(new_value));
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(prefix_len = prefix.len()))]
    async fn get_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>> {
        let data = self.data.read();
        let ttl_data = self.ttl_data.read();
        let now = Instant::now();

        let results = data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| !Self::is_expired(&ttl_data, key, now))
            .map(|(key, value)| KeyValue::new(Bytes::copy_from_slice(key), value.clone()))
            .collect();

        Ok(results)
    }

    #[tracing::instrument(skip_all, fields(prefix_len = prefix.len()))]
    async fn clear_prefix(&self, prefix: &[u8]) -> StorageResult<usize> {
        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        let now = Instant::now();

        let keys: Vec<Vec<u8>> = data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            let expired = Self::is_expired(&ttl_data, &key, now);
            ttl_data.remove(&key);
            if data.remove(&key).is_some() && !expired {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let backend = MemoryBackend::new();
        backend.set(b"k".to_vec(), b"v".to_vec()).await.expect("set");

        assert!(backend.delete(b"k").await.expect("first delete"));
        assert!(!backend.delete(b"k").await.expect("second delete"));
    }

    #[tokio::test]
    async fn test_set_clears_previous_ttl() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"k".to_vec(), b"v1".to_vec(), Duration::from_millis(10))
            .await
            .expect("set_with_ttl");
        backend.set(b"k".to_vec(), b"v2".to_vec()).await.expect("set");

        tokio::time::sleep(Duration::from_millis(30)).await;

        let value = backend.get(b"k").await.expect("get");
        assert_eq!(value, Some(Bytes::from("v2")));
    }

    #[tokio::test]
    async fn test_compare_and_set_treats_expired_value_as_absent() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"k".to_vec(), b"old".to_vec(), Duration::from_millis(5))
            .await
            .expect("set_with_ttl");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stale = backend.compare_and_set(b"k", Some(b"old"), b"new".to_vec(), None).await;
        assert!(matches!(stale, Err(StorageError::Conflict)));
        backend.compare_and_set(b"k", None, b"new".to_vec(), None).await.expect("insert");
        assert_eq!(backend.get(b"k").await.expect("get"), Some(Bytes::from("new")));
    }

    #[tokio::test]
    async fn test_expired_key_is_invisible_before_sweep() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::from_millis(5))
            .await
            .expect("set_with_ttl");

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(backend.get(b"k").await.expect("get"), None);
        assert!(backend.get_prefix(b"").await.expect("scan").is_empty());
        assert!(!backend.delete(b"k").await.expect("delete"));
    }

    #[tokio::test]
    async fn test_get_prefix_stops_at_prefix_boundary() {
        let backend = MemoryBackend::new();
        for key in [b"a/1".as_slice(), b"a/2", b"b/1", b"a"] {
            backend.set(key.to_vec(), b"v".to_vec()).await.expect("set");
        }

        let results = backend.get_prefix(b"a/").await.expect("scan");
        let keys: Vec<&[u8]> = results.iter().map(|kv| kv.key.as_ref()).collect();
        assert_eq!(keys, vec![b"a/1".as_slice(), b"a/2"]);
    }

    #[rstest::rstest]
    #[case::exact_prefix(b"a/".as_slice(), 2)]
    #[case::shared_root(b"a".as_slice(), 3)]
    #[case::no_match(b"c/".as_slice(), 0)]
    #[case::empty_prefix(b"".as_slice(), 4)]
    #[tokio::test]
    async fn test_get_prefix_counts(#[case] prefix: &[u8], #[case] expected: usize) {
        let backend = MemoryBackend::new();
        for key in [b"a/1".as_slice(), b"a/2", b"b/1", b"a"] {
            backend.set(key.to_vec(), b"v".to_vec()).await.expect("set");
        }

        assert_eq!(backend.get_prefix(prefix).await.expect("scan").len(), expected);
    }

    #[tokio::test]
    async fn test_clear_prefix_counts_live_keys() {
        let backend = MemoryBackend::new();
        backend.set(b"t/1".to_vec(), b"v".to_vec()).await.expect("set");
        backend.set(b"t/2".to_vec(), b"v".to_vec()).await.expect("set");
        backend.set(b"u/1".to_vec(), b"v".to_vec()).await.expect("set");

        let removed = backend.clear_prefix(b"t/").await.expect("clear");
        assert_eq!(removed, 2);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let backend = MemoryBackend::new();
        let cloned = backend.clone();
        backend.set(b"shared".to_vec(), b"v".to_vec()).await.expect("set");

        assert!(cloned.get(b"shared").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_background_sweep_removes_expired_keys() {
        let backend = MemoryBackend::new();
        backend
            .set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::from_millis(10))
            .await
            .expect("set_with_ttl");
        assert_eq!(backend.len(), 1);

        tokio::time::sleep(CLEANUP_INTERVAL + Duration::from_millis(200)).await;

        assert!(backend.is_empty(), "sweep should physically remove expired keys");
    }
}
