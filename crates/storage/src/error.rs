//! Storage error types and result alias.
//!
//! All storage backends map their internal errors to [`StorageError`].
//!
//! # Error Types
//!
//! - [`StorageError::Conflict`] - A compare-and-set found a different value
//! - [`StorageError::Connection`] - Network or connection-related failures
//! - [`StorageError::Serialization`] - Data encoding/decoding failures
//! - [`StorageError::Internal`] - Backend-specific internal errors
//! - [`StorageError::Unsupported`] - Backend does not implement the operation
//!
//! # Example
//!
//! ```
//! use sso_tickets_storage::{StorageError, StorageResult};
//!
//! fn scan() -> StorageResult<Vec<u8>> {
//!     Err(StorageError::unsupported("get_prefix"))
//! }
//!
//! assert!(matches!(scan(), Err(StorageError::Unsupported { .. })));
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A compare-and-set found a value other than the expected one.
    ///
    /// Absent keys are never an error; lookups report them as `None`.
    #[error("Conflict")]
    Conflict,

    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Serialization or deserialization error.
    ///
    /// Typically indicates data corruption or a record written by an
    /// incompatible version.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backend does not implement this operation.
    ///
    /// Distinct from a failure: retrying will never succeed. Callers that
    /// can degrade (e.g. full-scan counters) should treat this as
    /// "not measurable" rather than as an outage.
    #[error("Operation not supported by this backend: {operation}")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: String,
    },
}

impl StorageError {
    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict() -> Self {
        Self::Conflict
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Unsupported` error for the named operation.
    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported { operation: operation.into() }
    }

    /// Returns `true` if the backend does not implement the operation.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_only_unsupported_is_unsupported() {
        assert!(!StorageError::connection("refused").is_unsupported());
        assert!(!StorageError::conflict().is_unsupported());
        assert!(!StorageError::internal("boom").is_unsupported());
    }

    #[test]
    fn test_unsupported_display() {
        let err = StorageError::unsupported("get_prefix");
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "Operation not supported by this backend: get_prefix");
    }

    #[test]
    fn test_source_chain_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated record");
        let err = StorageError::serialization_with_source("stored record", io);
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("truncated record"));
    }
}
