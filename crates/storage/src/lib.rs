//! Byte-level key/value storage abstraction for the SSO ticket registry.
//!
//! This crate provides the [`StorageBackend`] trait and the types that sit
//! beneath the ticket registry. Backends deal only in opaque bytes; ticket
//! semantics (hierarchy, encryption, cascading deletion) live one layer up in
//! `sso-tickets-registry`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  sso-tickets-registry                       │
//! │   TicketRegistry │ cascade │ TicketCodec │ cleaner          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    KvTicketStore                            │
//! │          (record serialization, key prefixing)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  sso-tickets-storage                        │
//! │              StorageBackend trait                           │
//! │  (get, set, set_with_ttl, compare_and_set, delete, ...)     │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│    deployment backends (cache, database)     │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sso_tickets_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"tickets/TGT-1".to_vec(), b"{}".to_vec()).await?;
//!
//!     let value = backend.get(b"tickets/TGT-1").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"{}".to_vec()));
//!
//!     assert!(backend.delete(b"tickets/TGT-1").await?);
//!     assert!(!backend.delete(b"tickets/TGT-1").await?);
//!     Ok(())
//! }
//! ```
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Map backend-specific errors to [`StorageError`]
//! 3. Run the [`conformance`] suite against it (feature `testutil`)
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` and `conformance` modules with shared test helpers.
//!   Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod backend;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

pub use backend::StorageBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use types::KeyValue;
