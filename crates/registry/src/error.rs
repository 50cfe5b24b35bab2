//! Registry error types and result alias.
//!
//! "Not found" is never an error at this layer: lookups return `None` and
//! deletes return `0`/`false`. What remains is a type mismatch on a typed
//! lookup, a cryptographic fault, a payload that does not deserialize, an
//! invalid configuration, or a fault reported by the backing store.

use std::sync::Arc;

use sso_tickets_storage::{BoxError, StorageError};
use thiserror::Error;

use crate::ticket::TicketKind;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors produced by the cipher capability.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CipherError {
    /// Key material was rejected.
    #[error("Invalid cipher key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("Encryption failed")]
    Encrypt,

    /// Decryption or authentication of the payload failed.
    #[error("Decryption failed")]
    Decrypt,

    /// The payload is shorter than the envelope header.
    #[error("Encrypted payload too short: {len} bytes")]
    PayloadTooShort {
        /// Length of the rejected payload.
        len: usize,
    },

    /// The payload was not produced by this cipher (wrong magic or version).
    #[error("Unrecognized encrypted payload")]
    UnknownEnvelope,

    /// An encrypted record was read while the cipher is disabled.
    #[error("Cipher is disabled")]
    Disabled,
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field holds a value outside its allowed range.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A field required by the current settings is missing.
    #[error("Missing required field `{0}`")]
    Missing(&'static str),
}

impl ConfigError {
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue { field, reason: reason.into() }
    }
}

/// Errors that can occur during registry operations.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A typed lookup found a ticket of an incompatible kind.
    #[error("Ticket {id} is a {actual}, expected {expected}")]
    TypeMismatch {
        /// Id of the ticket that was found.
        id: String,
        /// The kind the caller asked for.
        expected: TicketKind,
        /// The kind actually stored.
        actual: TicketKind,
    },

    /// Encryption or decryption of a ticket payload failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CipherError),

    /// A ticket payload could not be serialized or deserialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The backing store reported a fault.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The registry configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RegistryError {
    /// Creates a new `TypeMismatch` error.
    #[must_use]
    pub fn type_mismatch(id: impl Into<String>, expected: TicketKind, actual: TicketKind) -> Self {
        Self::TypeMismatch { id: id.into(), expected, actual }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_with_source("ticket payload", err)
    }
}
