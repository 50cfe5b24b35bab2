//! The registry contract and its default implementation.
//!
//! [`TicketRegistry`] is what callers program against. Implementations
//! supply the primitives (`add_ticket`, `get_ticket`, `find_ticket`,
//! `get_tickets`, `update_ticket`, `update_existing_ticket`,
//! `delete_single_ticket`); typed lookups, counting and cascading deletion
//! come for free as provided methods.
//!
//! [`DefaultTicketRegistry`] implements the primitives over any
//! [`TicketStore`], running every ticket through a [`TicketCodec`] on its
//! way in and out.
//!
//! ```text
//! get_ticket(id) ──► encode_ticket_id ──► store.get ──► decode_ticket ──► expiry check
//! add_ticket(t)  ──► encode_ticket ─────► store.put(record, ttl)
//! delete_ticket  ──► cascade::delete_ticket (children first, then self)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use tracing::{trace, warn};

use crate::{
    cascade,
    codec::TicketCodec,
    config::RegistryConfig,
    count::TicketCount,
    error::{RegistryError, RegistryResult},
    metrics::RegistryMetrics,
    store::TicketStore,
    ticket::{Ticket, TicketKind},
};

/// Operations every ticket registry supports.
///
/// `id` arguments are always the plaintext ticket id as seen by callers.
/// Returned tickets are detached snapshots: mutate them and call
/// [`update_ticket`](Self::update_ticket) to persist the change.
#[async_trait]
pub trait TicketRegistry: Send + Sync {
    /// Stores a new ticket.
    async fn add_ticket(&self, ticket: &Ticket) -> RegistryResult<()>;

    /// Looks up a ticket.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ticket))` if a live ticket exists
    /// - `Ok(None)` if it is missing or expired
    /// - `Err(...)` on storage or crypto faults
    async fn get_ticket(&self, id: &str) -> RegistryResult<Option<Ticket>>;

    /// Looks up a stored ticket whether or not it has expired.
    ///
    /// Cascading deletion walks children with this lookup, so an expired
    /// proxy-granting ticket is removed along with what it issued.
    async fn find_ticket(&self, id: &str) -> RegistryResult<Option<Ticket>>;

    /// Returns every live ticket, in no particular order.
    ///
    /// # Errors
    ///
    /// Registries whose store cannot enumerate return
    /// [`StorageError::Unsupported`](sso_tickets_storage::StorageError::Unsupported)
    /// wrapped in [`RegistryError::Storage`].
    async fn get_tickets(&self) -> RegistryResult<Vec<Ticket>>;

    /// Persists a mutated ticket, replacing the stored copy.
    async fn update_ticket(&self, ticket: &Ticket) -> RegistryResult<()>;

    /// Persists a mutated ticket only if it is still stored.
    ///
    /// Returns `false`, writing nothing, if the ticket was removed since it
    /// was read. The existence check and the write are atomic per id.
    async fn update_existing_ticket(&self, ticket: &Ticket) -> RegistryResult<bool>;

    /// Removes exactly one ticket record without touching its children.
    ///
    /// Returns `true` if the record existed.
    async fn delete_single_ticket(&self, id: &str) -> RegistryResult<bool>;

    /// Looks up a ticket and checks that it is of kind `kind`.
    ///
    /// A proxy-granting ticket satisfies a ticket-granting request.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TypeMismatch`] if a ticket exists but is of an
    /// incompatible kind.
    async fn get_ticket_of_kind(
        &self,
        id: &str,
        kind: TicketKind,
    ) -> RegistryResult<Option<Ticket>> {
        match self.get_ticket(id).await? {
            Some(ticket) => ensure_kind(ticket, kind).map(Some),
            None => Ok(None),
        }
    }

    /// Number of live sessions (ticket-granting tickets, proxies excluded).
    ///
    /// Never fails; see [`TicketCount`].
    async fn session_count(&self) -> TicketCount {
        count_matching("session_count", self.get_tickets().await, |ticket| {
            ticket.kind() == TicketKind::TicketGrantingTicket
        })
    }

    /// Number of live service tickets.
    ///
    /// Never fails; see [`TicketCount`].
    async fn service_ticket_count(&self) -> TicketCount {
        count_matching("service_ticket_count", self.get_tickets().await, |ticket| {
            ticket.kind() == TicketKind::ServiceTicket
        })
    }

    /// Deletes a ticket and everything it issued.
    ///
    /// Returns the number of records removed; `0` for a blank, unknown or
    /// expired id. See [`cascade`] for the algorithm.
    async fn delete_ticket(&self, id: &str) -> RegistryResult<usize> {
        cascade::delete_ticket(self, id).await
    }
}

/// Checks `ticket` against a requested kind.
pub(crate) fn ensure_kind(ticket: Ticket, kind: TicketKind) -> RegistryResult<Ticket> {
    if kind.is_assignable_from(ticket.kind()) {
        Ok(ticket)
    } else {
        Err(RegistryError::type_mismatch(ticket.id(), kind, ticket.kind()))
    }
}

fn count_matching(
    operation: &'static str,
    tickets: RegistryResult<Vec<Ticket>>,
    predicate: impl Fn(&Ticket) -> bool,
) -> TicketCount {
    match tickets {
        Ok(tickets) => TicketCount::Known(tickets.iter().filter(|&t| predicate(t)).count() as u64),
        Err(RegistryError::Storage(e)) if e.is_unsupported() => {
            trace!(operation, "Ticket enumeration is not supported, count is unknown");
            TicketCount::Unsupported
        },
        Err(e) => {
            warn!(operation, error = %e, "Ticket enumeration failed, count is unknown");
            TicketCount::Unavailable
        },
    }
}

/// [`TicketRegistry`] over a [`TicketStore`] with optional encryption.
///
/// Expired tickets are invisible to lookups but stay in the store until a
/// cascade, the [`TicketRegistryCleaner`](crate::TicketRegistryCleaner) or
/// the store's own TTL removes them.
///
/// # Examples
///
/// ```
/// use sso_tickets_registry::{
///     DefaultTicketRegistry, ExpirationPolicy, MemoryTicketStore, Ticket,
///     TicketGrantingTicket, TicketRegistry,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = DefaultTicketRegistry::new(MemoryTicketStore::new());
///
///     let tgt = TicketGrantingTicket::builder()
///         .id("TGT-1")
///         .principal("casuser")
///         .expiration_policy(ExpirationPolicy::NeverExpires)
///         .build();
///     registry.add_ticket(&Ticket::from(tgt)).await?;
///
///     assert!(registry.get_ticket("TGT-1").await?.is_some());
///     assert_eq!(registry.delete_ticket("TGT-1").await?, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DefaultTicketRegistry<S> {
    store: S,
    codec: TicketCodec,
    metrics: RegistryMetrics,
}

impl<S: TicketStore> DefaultTicketRegistry<S> {
    /// Creates a registry that stores tickets unencrypted.
    pub fn new(store: S) -> Self {
        Self::with_codec(store, TicketCodec::disabled())
    }

    /// Creates a registry that encodes tickets with `codec`.
    pub fn with_codec(store: S, codec: TicketCodec) -> Self {
        Self { store, codec, metrics: RegistryMetrics::new() }
    }

    /// Creates a registry from configuration, building the cipher it
    /// describes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Config`] if the configuration is invalid.
    pub fn from_config(store: S, config: &RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;
        let cipher = config.crypto.build_cipher()?;
        Ok(Self::with_codec(store, TicketCodec::new(cipher)))
    }

    /// Replaces the metrics collector, e.g. to share one with a cleaner.
    #[must_use]
    pub fn with_metrics(mut self, metrics: RegistryMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &TicketCodec {
        &self.codec
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Removes every ticket from the store. Returns the number removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_all(&self) -> RegistryResult<usize> {
        Ok(self.store.clear().await?)
    }

    /// Returns every stored ticket whose policy reports it expired.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot enumerate or a record cannot be decoded.
    #[tracing::instrument(skip(self))]
    pub async fn expired_tickets(&self) -> RegistryResult<Vec<Ticket>> {
        let now = Utc::now();
        Ok(self.decode_all().await?.into_iter().filter(|t| t.is_expired(now)).collect())
    }

    async fn decode_all(&self) -> RegistryResult<Vec<Ticket>> {
        let records = self.store.list_all().await?;
        self.observe_crypto(self.codec.decode_tickets(records))
    }

    async fn put(&self, ticket: &Ticket) -> RegistryResult<()> {
        let record = self.observe_crypto(self.codec.encode_ticket(ticket))?;
        self.store.put(record, ticket.time_to_live(Utc::now())).await?;
        Ok(())
    }

    /// Fetches and decodes a record without looking at its expiry.
    async fn load(&self, id: &str) -> RegistryResult<Option<Ticket>> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        let key = self.codec.encode_ticket_id(id);
        let record = self.store.get(&key).await?;
        self.observe_crypto(self.codec.decode_ticket(record))
    }

    fn observe_crypto<T>(&self, result: RegistryResult<T>) -> RegistryResult<T> {
        if matches!(result, Err(RegistryError::Crypto(_))) {
            self.metrics.record_crypto_failure();
        }
        result
    }
}

#[async_trait]
impl<S: TicketStore> TicketRegistry for DefaultTicketRegistry<S> {
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket.id(), kind = %ticket.kind()))]
    async fn add_ticket(&self, ticket: &Ticket) -> RegistryResult<()> {
        self.put(ticket).await?;
        self.metrics.record_add();
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(ticket_id = %id))]
    async fn get_ticket(&self, id: &str) -> RegistryResult<Option<Ticket>> {
        let Some(ticket) = self.load(id).await? else {
            self.metrics.record_lookup(false);
            return Ok(None);
        };
        if ticket.is_expired(Utc::now()) {
            trace!("Ticket is expired");
            self.metrics.record_expired_lookup();
            self.metrics.record_lookup(false);
            return Ok(None);
        }
        self.metrics.record_lookup(true);
        Ok(Some(ticket))
    }

    #[tracing::instrument(skip(self), fields(ticket_id = %id))]
    async fn find_ticket(&self, id: &str) -> RegistryResult<Option<Ticket>> {
        self.load(id).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_tickets(&self) -> RegistryResult<Vec<Ticket>> {
        let now = Utc::now();
        Ok(self.decode_all().await?.into_iter().filter(|t| !t.is_expired(now)).collect())
    }

    #[tracing::instrument(skip_all, fields(ticket_id = %ticket.id(), kind = %ticket.kind()))]
    async fn update_ticket(&self, ticket: &Ticket) -> RegistryResult<()> {
        self.put(ticket).await?;
        self.metrics.record_update();
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(ticket_id = %ticket.id(), kind = %ticket.kind()))]
    async fn update_existing_ticket(&self, ticket: &Ticket) -> RegistryResult<bool> {
        let record = self.observe_crypto(self.codec.encode_ticket(ticket))?;
        let replaced = self.store.replace(record, ticket.time_to_live(Utc::now())).await?;
        if replaced {
            self.metrics.record_update();
        } else {
            trace!("Ticket no longer stored, update skipped");
        }
        Ok(replaced)
    }

    #[tracing::instrument(skip(self), fields(ticket_id = %id))]
    async fn delete_single_ticket(&self, id: &str) -> RegistryResult<bool> {
        if id.trim().is_empty() {
            return Ok(false);
        }
        Ok(self.store.remove(&self.codec.encode_ticket_id(id)).await?)
    }

    #[tracing::instrument(skip(self), fields(ticket_id = %id, expected = %kind))]
    async fn get_ticket_of_kind(
        &self,
        id: &str,
        kind: TicketKind,
    ) -> RegistryResult<Option<Ticket>> {
        let Some(ticket) = self.get_ticket(id).await? else {
            return Ok(None);
        };
        ensure_kind(ticket, kind).map(Some).inspect_err(|_| self.metrics.record_type_mismatch())
    }

    #[tracing::instrument(skip(self), fields(ticket_id = %id))]
    async fn delete_ticket(&self, id: &str) -> RegistryResult<usize> {
        let count = cascade::delete_ticket(self, id).await?;
        self.metrics.record_deleted(count);
        Ok(count)
    }
}
