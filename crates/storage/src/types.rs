//! Common types used across storage operations.

use bytes::Bytes;

/// Key-value pair returned from prefix scans.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use sso_tickets_storage::KeyValue;
///
/// let kv = KeyValue {
///     key: Bytes::from("tickets/TGT-1"),
///     value: Bytes::from(r#"{"kind":"plain"}"#),
/// };
/// assert!(kv.key.starts_with(b"tickets/"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}
