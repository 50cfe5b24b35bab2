//! Shared fixtures for registry tests.
//!
//! Feature-gated behind `testutil` to keep it out of production builds.
//!
//! ```toml
//! [dev-dependencies]
//! sso-tickets-registry = { path = "../registry", features = ["testutil"] }
//! ```

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use sso_tickets_storage::{StorageError, StorageResult};

use crate::{
    cipher::{AeadCipherExecutor, CipherExecutor, KEY_LEN},
    codec::{StoredTicket, TicketCodec},
    error::CipherError,
    registry::TicketRegistry,
    store::{MemoryTicketStore, TicketStore},
    ticket::{ExpirationPolicy, Ticket, TicketGrantingTicket},
};

/// Key used by [`fixed_cipher`].
pub const FIXED_KEY: [u8; KEY_LEN] = [0x42; KEY_LEN];

/// An enabled AES-256-GCM cipher with a well-known key.
pub fn fixed_cipher() -> Arc<dyn CipherExecutor> {
    Arc::new(AeadCipherExecutor::new(&FIXED_KEY).expect("fixed key is 32 bytes"))
}

/// A codec using [`fixed_cipher`].
pub fn encrypting_codec() -> TicketCodec {
    TicketCodec::new(fixed_cipher())
}

/// Ids of a session hierarchy stored by [`store_session_hierarchy`].
///
/// ```text
/// TGT-p ──┬── ST-p-1, ST-p-2, ST-p-3
///         ├── PGT-p-1 ── ST-p-proxied (proxy ticket)
///         └── PGT-p-2
/// ```
#[derive(Debug, Clone)]
pub struct SessionHierarchy {
    pub tgt: String,
    pub service_tickets: Vec<String>,
    pub proxy_granting_tickets: Vec<String>,
    pub proxy_tickets: Vec<String>,
}

impl SessionHierarchy {
    /// Every id in the hierarchy, root first.
    #[must_use]
    pub fn all_ids(&self) -> Vec<String> {
        std::iter::once(self.tgt.clone())
            .chain(self.service_tickets.iter().cloned())
            .chain(self.proxy_granting_tickets.iter().cloned())
            .chain(self.proxy_tickets.iter().cloned())
            .collect()
    }
}

/// Stores a session with three service tickets and two proxy-granting
/// tickets, the first of which issued one proxy ticket. Seven tickets in all.
///
/// Ids are prefixed with `prefix` so several hierarchies can share a store.
///
/// # Panics
///
/// Panics if the registry rejects a ticket.
pub async fn store_session_hierarchy<R>(registry: &R, prefix: &str) -> SessionHierarchy
where
    R: TicketRegistry + ?Sized,
{
    let now = Utc::now();
    let policy = ExpirationPolicy::NeverExpires;
    let mut tgt = TicketGrantingTicket::builder()
        .id(format!("TGT-{prefix}"))
        .principal("casuser")
        .expiration_policy(policy.clone())
        .build();

    let mut tickets: Vec<Ticket> = Vec::new();
    let mut service_tickets = Vec::new();
    for n in 1..=3 {
        let st = tgt.grant_service_ticket(
            format!("ST-{prefix}-{n}"),
            format!("https://app{n}.example.com"),
            policy.clone(),
            now,
        );
        service_tickets.push(st.id.clone());
        tickets.push(st.into());
    }

    let mut proxy_granting_tickets = Vec::new();
    let mut proxy_tickets = Vec::new();
    for n in 1..=2 {
        let mut pgt = tgt.grant_proxy_granting_ticket(
            format!("PGT-{prefix}-{n}"),
            format!("https://proxy{n}.example.com"),
            policy.clone(),
            now,
        );
        if n == 1 {
            let pt = pgt.granting.grant_service_ticket(
                format!("ST-{prefix}-proxied"),
                "https://backend.example.com",
                policy.clone(),
                now,
            );
            proxy_tickets.push(pt.id.clone());
            tickets.push(pt.into());
        }
        proxy_granting_tickets.push(pgt.id().to_owned());
        tickets.push(pgt.into());
    }

    let hierarchy =
        SessionHierarchy { tgt: tgt.id.clone(), service_tickets, proxy_granting_tickets, proxy_tickets };

    registry.add_ticket(&tgt.into()).await.expect("add session");
    for ticket in &tickets {
        registry.add_ticket(ticket).await.expect("add child ticket");
    }
    hierarchy
}

/// A session with no children and no expiry.
#[must_use]
pub fn session(id: &str) -> Ticket {
    TicketGrantingTicket::builder()
        .id(id)
        .principal("casuser")
        .expiration_policy(ExpirationPolicy::NeverExpires)
        .build()
        .into()
}

/// A [`TicketStore`] that can be told to fail.
///
/// Wraps a [`MemoryTicketStore`]. Enumeration fails with a connection error
/// when `fail_list` is set, and removing any id in `fail_remove` fails with
/// an internal error.
#[derive(Debug, Default, Clone)]
pub struct FailingStore {
    pub inner: MemoryTicketStore,
    fail_list: Arc<Mutex<bool>>,
    fail_remove: Arc<Mutex<HashSet<String>>>,
}

impl FailingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_list(&self, fail: bool) {
        *self.fail_list.lock() = fail;
    }

    /// Makes removal of the record stored under `key` fail.
    pub fn fail_remove(&self, key: impl Into<String>) {
        self.fail_remove.lock().insert(key.into());
    }
}

#[async_trait]
impl TicketStore for FailingStore {
    async fn get(&self, key: &str) -> StorageResult<Option<StoredTicket>> {
        self.inner.get(key).await
    }

    async fn put(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<()> {
        self.inner.put(record, ttl).await
    }

    async fn replace(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<bool> {
        self.inner.replace(record, ttl).await
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        if self.fail_remove.lock().contains(key) {
            return Err(StorageError::internal(format!("injected remove failure for {key}")));
        }
        self.inner.remove(key).await
    }

    async fn list_all(&self) -> StorageResult<Vec<StoredTicket>> {
        if *self.fail_list.lock() {
            return Err(StorageError::connection("injected list failure"));
        }
        self.inner.list_all().await
    }

    async fn clear(&self) -> StorageResult<usize> {
        self.inner.clear().await
    }
}

/// A [`TicketStore`] that cannot enumerate (keeps the default `list_all`).
#[derive(Debug, Default, Clone)]
pub struct UnsupportedListStore {
    pub inner: MemoryTicketStore,
}

#[async_trait]
impl TicketStore for UnsupportedListStore {
    async fn get(&self, key: &str) -> StorageResult<Option<StoredTicket>> {
        self.inner.get(key).await
    }

    async fn put(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<()> {
        self.inner.put(record, ttl).await
    }

    async fn replace(&self, record: StoredTicket, ttl: Option<Duration>) -> StorageResult<bool> {
        self.inner.replace(record, ttl).await
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        self.inner.remove(key).await
    }

    async fn clear(&self) -> StorageResult<usize> {
        self.inner.clear().await
    }
}

/// An enabled cipher whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingCipher;

impl CipherExecutor for FailingCipher {
    fn is_enabled(&self) -> bool {
        true
    }

    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Encrypt)
    }

    fn decrypt(&self, _payload: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Decrypt)
    }
}

/// Assert that a result is an error of the given [`RegistryError`] variant.
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use sso_tickets_registry::{assert_registry_error, RegistryError, RegistryResult};
/// use sso_tickets_registry::CipherError;
///
/// let result: RegistryResult<()> = Err(RegistryError::Crypto(CipherError::Decrypt));
/// assert_registry_error!(result, Crypto);
/// ```
///
/// [`RegistryError`]: crate::RegistryError
#[macro_export]
macro_rules! assert_registry_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::RegistryError::$variant { .. })),
            "expected RegistryError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{count::TicketCount, registry::DefaultTicketRegistry, RegistryResult};

    #[tokio::test]
    async fn test_hierarchy_has_seven_tickets() {
        let store = MemoryTicketStore::new();
        let registry = DefaultTicketRegistry::new(store.clone());
        let hierarchy = store_session_hierarchy(&registry, "a").await;

        assert_eq!(hierarchy.all_ids().len(), 7);
        assert_eq!(store.len(), 7);
    }

    #[tokio::test]
    async fn test_failing_store_counts_are_unavailable() {
        let store = FailingStore::new();
        let registry = DefaultTicketRegistry::new(store.clone());
        store.fail_list(true);
        assert_eq!(registry.session_count().await, TicketCount::Unavailable);
    }

    #[test]
    fn test_assert_registry_error_macro() {
        let result: RegistryResult<()> = Err(CipherError::Decrypt.into());
        assert_registry_error!(result, Crypto);
    }
}
