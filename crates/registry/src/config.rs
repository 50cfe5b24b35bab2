//! Registry configuration.
//!
//! Loaded with serde (unknown fields rejected, durations in humantime form
//! such as `"30s"`) or assembled with the validating builder.
//!
//! ```
//! use sso_tickets_registry::RegistryConfig;
//!
//! let config: RegistryConfig = serde_json::from_str(
//!     r#"{ "key_prefix": "sso/tickets/", "cleaner": { "interval": "30s" } }"#,
//! )?;
//! config.validate()?;
//! assert_eq!(config.cleaner.interval.as_secs(), 30);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fmt, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    cipher::{AeadCipherExecutor, CipherExecutor, KEY_LEN, NoOpCipherExecutor},
    error::ConfigError,
    store::DEFAULT_KEY_PREFIX,
};

/// Default delay before the first cleaner pass.
const DEFAULT_START_DELAY: Duration = Duration::from_secs(10);

/// Default time between cleaner passes.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Top-level registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Key prefix for records in a byte-level backend.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Encryption at rest.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Background removal of expired tickets.
    #[serde(default)]
    pub cleaner: CleanerConfig,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_owned()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            crypto: CryptoConfig::default(),
            cleaner: CleanerConfig::default(),
        }
    }
}

#[bon::bon]
impl RegistryConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Errors
    ///
    /// See [`RegistryConfig::validate`].
    #[builder]
    pub fn new(
        #[builder(into, default = default_key_prefix())] key_prefix: String,
        #[builder(default)] crypto: CryptoConfig,
        #[builder(default)] cleaner: CleanerConfig,
    ) -> Result<Self, ConfigError> {
        let config = Self { key_prefix, crypto, cleaner };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `key_prefix` is empty
    /// - the cleaner interval is zero
    /// - encryption is enabled without a valid key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::invalid("key_prefix", "cannot be empty"));
        }
        self.cleaner.validate()?;
        self.crypto.build_cipher().map(drop)
    }
}

/// Key material for [`AeadCipherExecutor`]: base64 (URL-safe, no padding)
/// encoding of 32 bytes. Wiped from memory on drop and redacted from `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct CipherKey(String);

impl CipherKey {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encodes raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(&self) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        URL_SAFE_NO_PAD
            .decode(&self.0)
            .map(Zeroizing::new)
            .map_err(|e| ConfigError::invalid("crypto.key", e.to_string()))
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(<redacted>)")
    }
}

/// Encryption-at-rest settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct CryptoConfig {
    /// Whether tickets are encrypted before they reach the store.
    #[serde(default)]
    #[builder(default)]
    pub enabled: bool,

    /// Required when `enabled`.
    #[serde(default)]
    pub key: Option<CipherKey>,
}

impl CryptoConfig {
    /// Builds the cipher described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption is enabled and the key is missing, is
    /// not valid base64, or does not decode to exactly 32 bytes.
    pub fn build_cipher(&self) -> Result<Arc<dyn CipherExecutor>, ConfigError> {
        if !self.enabled {
            return Ok(Arc::new(NoOpCipherExecutor));
        }
        let key = self.key.as_ref().ok_or(ConfigError::Missing("crypto.key"))?.decode()?;
        if key.len() != KEY_LEN {
            return Err(ConfigError::invalid(
                "crypto.key",
                format!("expected {KEY_LEN} bytes, got {}", key.len()),
            ));
        }
        let cipher = AeadCipherExecutor::new(&key)
            .map_err(|e| ConfigError::invalid("crypto.key", e.to_string()))?;
        Ok(Arc::new(cipher))
    }
}

/// Settings for the [`TicketRegistryCleaner`](crate::TicketRegistryCleaner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct CleanerConfig {
    /// Whether the background cleaner runs at all.
    #[serde(default = "default_enabled")]
    #[builder(default = true)]
    pub enabled: bool,

    /// Delay before the first pass.
    #[serde(with = "humantime_serde", default = "default_start_delay")]
    #[builder(default = DEFAULT_START_DELAY)]
    pub start_delay: Duration,

    /// Time between passes. Must be non-zero.
    #[serde(with = "humantime_serde", default = "default_interval")]
    #[builder(default = DEFAULT_INTERVAL)]
    pub interval: Duration,
}

fn default_enabled() -> bool {
    true
}

fn default_start_delay() -> Duration {
    DEFAULT_START_DELAY
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self { enabled: true, start_delay: DEFAULT_START_DELAY, interval: DEFAULT_INTERVAL }
    }
}

impl CleanerConfig {
    /// # Errors
    ///
    /// Returns an error if `interval` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::invalid("cleaner.interval", "must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::builder().build().unwrap();
        assert_eq!(config.key_prefix, "tickets/");
        assert!(!config.crypto.enabled);
        assert_eq!(config.cleaner, CleanerConfig::default());
        assert_eq!(config.cleaner.start_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let err = RegistryConfig::builder().key_prefix("").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "key_prefix", .. }));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cleaner = CleanerConfig::builder().interval(Duration::ZERO).build();
        let err = RegistryConfig::builder().cleaner(cleaner).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "cleaner.interval", .. }));
    }

    #[test]
    fn test_enabled_crypto_requires_key() {
        let crypto = CryptoConfig::builder().enabled(true).build();
        let err = RegistryConfig::builder().crypto(crypto).build().unwrap_err();
        assert_eq!(err, ConfigError::Missing("crypto.key"));
    }

    #[test]
    fn test_short_key_rejected() {
        let crypto =
            CryptoConfig::builder().enabled(true).key(CipherKey::from_bytes(&[1u8; 16])).build();
        assert!(matches!(
            crypto.build_cipher(),
            Err(ConfigError::InvalidValue { field: "crypto.key", .. })
        ));
    }

    #[test]
    fn test_valid_key_builds_enabled_cipher() {
        let crypto =
            CryptoConfig::builder().enabled(true).key(CipherKey::from_bytes(&[1u8; 32])).build();
        assert!(crypto.build_cipher().unwrap().is_enabled());
    }

    #[test]
    fn test_key_is_redacted() {
        let key = CipherKey::from_bytes(&[9u8; 32]);
        assert_eq!(format!("{key:?}"), "CipherKey(<redacted>)");
    }

    #[test]
    fn test_deserialize_humantime_and_reject_unknown() {
        let config: RegistryConfig = serde_json::from_str(
            r#"{"crypto":{"enabled":false},"cleaner":{"start_delay":"1m","interval":"5s"}}"#,
        )
        .unwrap();
        assert_eq!(config.cleaner.start_delay, Duration::from_secs(60));
        assert!(config.cleaner.enabled);

        let result = serde_json::from_str::<RegistryConfig>(r#"{"key_prefx":"typo/"}"#);
        assert!(result.is_err());
    }
}
