//! Shared test utilities for storage backend testing.
//!
//! Feature-gated behind `testutil` to keep it out of production builds.
//!
//! ```toml
//! [dev-dependencies]
//! sso-tickets-storage = { path = "../storage", features = ["testutil"] }
//! ```

use crate::{StorageBackend, memory::MemoryBackend};

/// Create a deterministic test key from a prefix and index.
///
/// Produces keys like `"prefix:000042"`; zero-padding keeps lexicographic
/// order equal to numeric order.
#[must_use]
pub fn make_key(prefix: &str, idx: usize) -> Vec<u8> {
    format!("{prefix}:{idx:06}").into_bytes()
}

/// Create a test value of the given size filled with `0xAB` bytes.
#[must_use]
pub fn make_value(size: usize) -> Vec<u8> {
    vec![0xAB; size]
}

/// Create a [`MemoryBackend`] pre-populated with `count` keys.
///
/// # Panics
///
/// Panics if any `set` operation fails (should not happen with `MemoryBackend`).
pub async fn populated_backend(prefix: &str, count: usize, value_size: usize) -> MemoryBackend {
    let backend = MemoryBackend::new();
    let value = make_value(value_size);
    for i in 0..count {
        backend.set(make_key(prefix, i), value.clone()).await.expect("populate set failed");
    }
    backend
}

/// Assert that a [`StorageResult`](crate::StorageResult) is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}
