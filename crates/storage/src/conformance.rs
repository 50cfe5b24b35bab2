//! Conformance test suite for [`StorageBackend`] implementations.
//!
//! Every backend the ticket registry runs on, in-memory or remote, can run
//! the same suite to prove it honours the trait contract.
//!
//! ```no_run
//! use sso_tickets_storage::{MemoryBackend, conformance};
//!
//! #[tokio::test]
//! async fn crud_get_returns_none_for_missing_key() {
//!     conformance::crud_get_returns_none_for_missing_key(&MemoryBackend::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | CRUD | get/set/delete semantics, delete reports existence |
//! | Prefix | `get_prefix` / `clear_prefix` ordering and boundaries |
//! | Compare-and-set | conditional writes, `Conflict` on mismatch |
//! | TTL | `set_with_ttl` expiration behavior |
//! | Concurrent | per-key atomicity under parallel deletes |

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use crate::{backend::StorageBackend, error::StorageError};

// ============================================================================
// CRUD
// ============================================================================

/// `get` on a nonexistent key returns `Ok(None)`.
pub async fn crud_get_returns_none_for_missing_key<B: StorageBackend>(backend: &B) {
    let result = backend.get(b"nonexistent").await;
    assert!(result.is_ok(), "get should not error on missing key: {result:?}");
    assert_eq!(result.expect("checked above"), None, "missing key should return None");
}

/// `set` then `get` round-trips the value.
pub async fn crud_set_then_get_returns_value<B: StorageBackend>(backend: &B) {
    backend.set(b"k1".to_vec(), b"v1".to_vec()).await.expect("set should succeed");
    let val = backend.get(b"k1").await.expect("get should succeed");
    assert_eq!(val, Some(Bytes::from("v1")));
}

/// `set` on an existing key overwrites the value.
pub async fn crud_set_overwrites_existing<B: StorageBackend>(backend: &B) {
    backend.set(b"k1".to_vec(), b"original".to_vec()).await.expect("set");
    backend.set(b"k1".to_vec(), b"updated".to_vec()).await.expect("overwrite");
    let val = backend.get(b"k1").await.expect("get");
    assert_eq!(val, Some(Bytes::from("updated")));
}

/// `delete` on a nonexistent key returns `Ok(false)`.
pub async fn crud_delete_nonexistent_returns_false<B: StorageBackend>(backend: &B) {
    let result = backend.delete(b"ghost").await;
    assert!(matches!(result, Ok(false)), "delete of missing key must be Ok(false): {result:?}");
}

/// `delete` removes a previously-set key and reports it.
pub async fn crud_delete_removes_key<B: StorageBackend>(backend: &B) {
    backend.set(b"k2".to_vec(), b"val".to_vec()).await.expect("set");
    assert!(backend.delete(b"k2").await.expect("delete"), "delete should report removal");
    let val = backend.get(b"k2").await.expect("get after delete");
    assert_eq!(val, None, "key should be gone after delete");
}

/// Deleting the same key twice reports `true` then `false`.
pub async fn crud_delete_is_idempotent<B: StorageBackend>(backend: &B) {
    backend.set(b"k3".to_vec(), b"val".to_vec()).await.expect("set");
    assert!(backend.delete(b"k3").await.expect("first delete"));
    assert!(!backend.delete(b"k3").await.expect("second delete"));
}

// ============================================================================
// Prefix
// ============================================================================

/// `get_prefix` returns matching keys in order and nothing outside the prefix.
pub async fn prefix_results_are_ordered_and_bounded<B: StorageBackend>(backend: &B) {
    for key in [b"p:c".as_slice(), b"p:a", b"p:b", b"q:a", b"p"] {
        backend.set(key.to_vec(), b"v".to_vec()).await.expect("set");
    }
    let results = backend.get_prefix(b"p:").await.expect("get_prefix");
    let keys: Vec<&[u8]> = results.iter().map(|kv| kv.key.as_ref()).collect();
    assert_eq!(keys, vec![b"p:a".as_slice(), b"p:b", b"p:c"]);
}

/// `get_prefix` on an empty backend returns an empty vector.
pub async fn prefix_empty_backend_returns_empty<B: StorageBackend>(backend: &B) {
    let results = backend.get_prefix(b"none:").await.expect("get_prefix");
    assert!(results.is_empty());
}

/// `clear_prefix` removes only keys under the prefix and counts them.
pub async fn prefix_clear_is_bounded<B: StorageBackend>(backend: &B) {
    for key in [b"c:1".as_slice(), b"c:2", b"d:1"] {
        backend.set(key.to_vec(), b"v".to_vec()).await.expect("set");
    }
    let removed = backend.clear_prefix(b"c:").await.expect("clear_prefix");
    assert_eq!(removed, 2);
    assert!(backend.get(b"d:1").await.expect("get").is_some(), "other prefix must survive");
    assert!(backend.get_prefix(b"c:").await.expect("get_prefix").is_empty());
}

// ============================================================================
// Compare-and-set
// ============================================================================

/// `expected = None` inserts only when the key is absent.
pub async fn cas_insert_if_absent<B: StorageBackend>(backend: &B) {
    backend.compare_and_set(b"cas:1", None, b"a".to_vec(), None).await.expect("insert");
    let second = backend.compare_and_set(b"cas:1", None, b"b".to_vec(), None).await;
    assert!(matches!(second, Err(StorageError::Conflict)), "got {second:?}");
    assert_eq!(backend.get(b"cas:1").await.expect("get"), Some(Bytes::from("a")));
}

/// A matching value is replaced; a stale one is a conflict and writes nothing.
pub async fn cas_replaces_only_matching_value<B: StorageBackend>(backend: &B) {
    backend.set(b"cas:2".to_vec(), b"v1".to_vec()).await.expect("set");
    backend
        .compare_and_set(b"cas:2", Some(b"v1"), b"v2".to_vec(), None)
        .await
        .expect("matching cas");
    let stale = backend.compare_and_set(b"cas:2", Some(b"v1"), b"v3".to_vec(), None).await;
    assert!(matches!(stale, Err(StorageError::Conflict)), "got {stale:?}");
    assert_eq!(backend.get(b"cas:2").await.expect("get"), Some(Bytes::from("v2")));
}

/// A key deleted underneath a compare-and-set is not recreated.
pub async fn cas_does_not_recreate_deleted_key<B: StorageBackend>(backend: &B) {
    backend.set(b"cas:3".to_vec(), b"v1".to_vec()).await.expect("set");
    assert!(backend.delete(b"cas:3").await.expect("delete"));
    let result = backend.compare_and_set(b"cas:3", Some(b"v1"), b"v2".to_vec(), None).await;
    assert!(matches!(result, Err(StorageError::Conflict)), "got {result:?}");
    assert_eq!(backend.get(b"cas:3").await.expect("get"), None);
}

// ============================================================================
// TTL
// ============================================================================

/// A key set with a TTL is readable before it expires.
pub async fn ttl_key_readable_before_expiry<B: StorageBackend>(backend: &B) {
    backend
        .set_with_ttl(b"ttl:1".to_vec(), b"v".to_vec(), Duration::from_secs(60))
        .await
        .expect("set_with_ttl");
    assert_eq!(backend.get(b"ttl:1").await.expect("get"), Some(Bytes::from("v")));
}

/// A key set with a short TTL disappears from reads and scans.
pub async fn ttl_key_invisible_after_expiry<B: StorageBackend>(backend: &B) {
    backend
        .set_with_ttl(b"ttl:2".to_vec(), b"v".to_vec(), Duration::from_millis(10))
        .await
        .expect("set_with_ttl");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.get(b"ttl:2").await.expect("get"), None);
    assert!(backend.get_prefix(b"ttl:").await.expect("get_prefix").is_empty());
}

// ============================================================================
// Concurrent
// ============================================================================

/// Racing deletes of the same key: exactly one caller observes the removal.
pub async fn concurrent_delete_reports_single_winner<B: StorageBackend + 'static>(backend: Arc<B>) {
    backend.set(b"race".to_vec(), b"v".to_vec()).await.expect("set");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move { backend.delete(b"race").await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("join").expect("delete") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one concurrent delete should report removal");
}

/// Runs every conformance check, each against a fresh backend.
pub async fn run_all<B, F>(factory: F)
where
    B: StorageBackend + 'static,
    F: Fn() -> B,
{
    crud_get_returns_none_for_missing_key(&factory()).await;
    crud_set_then_get_returns_value(&factory()).await;
    crud_set_overwrites_existing(&factory()).await;
    crud_delete_nonexistent_returns_false(&factory()).await;
    crud_delete_removes_key(&factory()).await;
    crud_delete_is_idempotent(&factory()).await;
    prefix_results_are_ordered_and_bounded(&factory()).await;
    prefix_empty_backend_returns_empty(&factory()).await;
    prefix_clear_is_bounded(&factory()).await;
    cas_insert_if_absent(&factory()).await;
    cas_replaces_only_matching_value(&factory()).await;
    cas_does_not_recreate_deleted_key(&factory()).await;
    ttl_key_readable_before_expiry(&factory()).await;
    ttl_key_invisible_after_expiry(&factory()).await;
    concurrent_delete_reports_single_winner(Arc::new(factory())).await;
}
