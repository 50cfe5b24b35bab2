//! Ticket registry for single-sign-on sessions.
//!
//! Issues nothing and speaks no protocol: this crate stores, looks up and
//! revokes the tickets an SSO server hands out, keeps the session hierarchy
//! consistent when tickets are deleted, and can keep tickets encrypted at
//! rest.
//!
//! # Ticket hierarchy
//!
//! A [`TicketGrantingTicket`] is the root of a session. It issues
//! [`ServiceTicket`]s for individual services and [`ProxyGrantingTicket`]s
//! that let a service act on the user's behalf. A proxy-granting ticket is a
//! granting ticket in its own right. Parents record their children by id;
//! deleting a parent deletes its children first (see [`cascade`]).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  TicketRegistry (trait)        TicketRegistryCleaner       │
//! │  get / find / add / update / delete_single + provided:     │
//! │  get_ticket_of_kind, counts, delete_ticket ─► cascade      │
//! ├────────────────────────────────────────────────────────────┤
//! │  DefaultTicketRegistry ── TicketCodec ── CipherExecutor    │
//! ├────────────────────────────────────────────────────────────┤
//! │  TicketStore: MemoryTicketStore │ KvTicketStore<Backend>   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use chrono::Utc;
//! use sso_tickets_registry::{
//!     DefaultTicketRegistry, ExpirationPolicy, MemoryTicketStore, Ticket,
//!     TicketGrantingTicket, TicketRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = DefaultTicketRegistry::new(MemoryTicketStore::new());
//!
//!     let mut session = TicketGrantingTicket::builder()
//!         .id("TGT-1")
//!         .principal("casuser")
//!         .expiration_policy(ExpirationPolicy::NeverExpires)
//!         .build();
//!     let st = session.grant_service_ticket(
//!         "ST-1",
//!         "https://app.example.com",
//!         ExpirationPolicy::NeverExpires,
//!         Utc::now(),
//!     );
//!
//!     registry.add_ticket(&Ticket::from(session)).await?;
//!     registry.add_ticket(&Ticket::from(st)).await?;
//!
//!     // Logging out removes the session and everything it issued.
//!     assert_eq!(registry.delete_ticket("TGT-1").await?, 2);
//!     assert!(registry.get_ticket("ST-1").await?.is_none());
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with hierarchy fixtures, failing stores and
//!   ciphers, and the `assert_registry_error!` macro.
//! - **`failpoints`**: Enables fail-point injection inside the cascade.

#![deny(unsafe_code)]

pub mod cascade;
pub mod cipher;
pub mod cleaner;
pub mod codec;
pub mod config;
pub mod count;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod ticket;

pub use cipher::{AeadCipherExecutor, CipherExecutor, NoOpCipherExecutor};
pub use cleaner::TicketRegistryCleaner;
pub use codec::{EncodedTicket, StoredTicket, TicketCodec};
pub use config::{CipherKey, CleanerConfig, CryptoConfig, RegistryConfig};
pub use count::{TicketCount, UNKNOWN_COUNT};
pub use error::{CipherError, ConfigError, RegistryError, RegistryResult};
pub use metrics::{RegistryMetrics, RegistryMetricsSnapshot};
pub use registry::{DefaultTicketRegistry, TicketRegistry};
pub use store::{KvTicketStore, MemoryTicketStore, TicketStore};
pub use ticket::{
    ExpirationPolicy, ProxyGrantingTicket, ServiceTicket, Ticket, TicketGrantingTicket,
    TicketIdGenerator, TicketKind, TicketState,
};
