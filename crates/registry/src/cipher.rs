//! The cipher capability consumed by the codec.
//!
//! The registry never manages keys: it is handed a [`CipherExecutor`] and uses
//! it opaquely. Two implementations ship with the crate:
//!
//! - [`NoOpCipherExecutor`] - disabled; the codec passes everything through
//! - [`AeadCipherExecutor`] - AES-256-GCM with a random nonce per message
//!
//! # Envelope
//!
//! ```text
//! ┌───────────┬─────────┬────────────┬──────────────────────┐
//! │ "STKT" 4B │ ver 1B  │ nonce 12B  │ ciphertext ‖ tag 16B │
//! └───────────┴─────────┴────────────┴──────────────────────┘
//! ```

use std::fmt;

use rand::{RngCore, rngs::OsRng};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use zeroize::Zeroizing;

use crate::error::CipherError;

const ENVELOPE_MAGIC: [u8; 4] = *b"STKT";
const ENVELOPE_VERSION: u8 = 1;
const HEADER_LEN: usize = ENVELOPE_MAGIC.len() + 1 + NONCE_LEN;
const TAG_LEN: usize = 16;

/// Length in bytes of an AES-256-GCM key.
pub const KEY_LEN: usize = 32;

/// Symmetric encrypt/decrypt capability.
///
/// Implementations must be deterministic in what they accept: anything
/// produced by `encrypt` must be accepted by `decrypt` on the same instance.
pub trait CipherExecutor: Send + Sync + fmt::Debug {
    /// Whether encoding is active. When `false` the codec never calls
    /// `encrypt` or `decrypt`.
    fn is_enabled(&self) -> bool;

    /// Encrypts `plaintext` into an opaque payload.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Reverses [`CipherExecutor::encrypt`].
    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// A cipher that is always disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCipherExecutor;

impl CipherExecutor for NoOpCipherExecutor {
    fn is_enabled(&self) -> bool {
        false
    }

    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Disabled)
    }

    fn decrypt(&self, _payload: &[u8]) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Disabled)
    }
}

/// AES-256-GCM cipher backed by `ring`.
pub struct AeadCipherExecutor {
    key: LessSafeKey,
}

impl AeadCipherExecutor {
    /// Creates a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] if `key` is not exactly
    /// [`KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| CipherError::InvalidKey("rejected by AES-256-GCM".to_owned()))?;
        Ok(Self { key: LessSafeKey::new(unbound) })
    }

    /// Creates a cipher with a fresh random key.
    ///
    /// Payloads encrypted by this instance cannot be read by any other.
    ///
    /// # Errors
    ///
    /// Propagates [`AeadCipherExecutor::new`] failures.
    pub fn generate() -> Result<Self, CipherError> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut *key);
        Self::new(&*key)
    }
}

impl fmt::Debug for AeadCipherExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadCipherExecutor")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

impl CipherExecutor for AeadCipherExecutor {
    fn is_enabled(&self) -> bool {
        true
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = Vec::with_capacity(plaintext.len() + TAG_LEN);
        in_out.extend_from_slice(plaintext);
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(ENVELOPE_MAGIC), &mut in_out)
            .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(HEADER_LEN + in_out.len());
        out.extend_from_slice(&ENVELOPE_MAGIC);
        out.push(ENVELOPE_VERSION);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, CipherError> {
        if payload.len() < HEADER_LEN + TAG_LEN {
            return Err(CipherError::PayloadTooShort { len: payload.len() });
        }
        let (header, body) = payload.split_at(HEADER_LEN);
        let (magic, rest) = header.split_at(ENVELOPE_MAGIC.len());
        let (version, nonce_bytes) = rest.split_at(1);
        if magic != ENVELOPE_MAGIC || version != [ENVELOPE_VERSION] {
            return Err(CipherError::UnknownEnvelope);
        }

        let nonce =
            Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CipherError::Decrypt)?;
        let mut in_out = Zeroizing::new(body.to_vec());
        let plain = self
            .key
            .open_in_place(nonce, Aad::from(ENVELOPE_MAGIC), &mut in_out)
            .map_err(|_| CipherError::Decrypt)?;
        Ok(plain.to_vec())
    }
}
