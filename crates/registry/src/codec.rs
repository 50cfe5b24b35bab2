//! Encode/decode pipeline between typed tickets and stored records.
//!
//! With an enabled cipher a ticket is serialized to JSON, encrypted, and
//! wrapped in an [`EncodedTicket`] keyed by the SHA-512 digest of its id, so
//! neither the payload nor the plaintext id is visible at rest. With a
//! disabled cipher every operation is a pass-through.
//!
//! ```text
//!   Ticket ──serialize──► JSON ──encrypt──► EncodedTicket { sha512(id), bytes }
//!   Ticket ◄─deserialize─ JSON ◄─decrypt─── EncodedTicket
//! ```
//!
//! Faults always propagate. An encryption failure never falls back to
//! storing plaintext.

use std::{fmt, sync::Arc};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};

use crate::{
    cipher::{CipherExecutor, NoOpCipherExecutor},
    error::{CipherError, RegistryResult},
    ticket::Ticket,
};

/// Opaque storage envelope for an encrypted ticket.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodedTicket {
    /// Digest of the plaintext ticket id.
    pub id: String,
    /// Encrypted, serialized ticket.
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub encoded: Vec<u8>,
}

impl fmt::Debug for EncodedTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedTicket")
            .field("id", &self.id)
            .field("encoded_len", &self.encoded.len())
            .finish()
    }
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}

/// A record as held by a [`TicketStore`](crate::store::TicketStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredTicket {
    /// A ticket stored as-is (cipher disabled).
    Plain(Ticket),
    /// An encrypted ticket.
    Encoded(EncodedTicket),
}

impl StoredTicket {
    /// The key this record is stored under: the plaintext id or its digest.
    #[must_use]
    pub fn storage_id(&self) -> &str {
        match self {
            Self::Plain(ticket) => ticket.id(),
            Self::Encoded(encoded) => &encoded.id,
        }
    }
}

/// Converts tickets to stored records and back using a cipher capability.
#[derive(Clone, Debug)]
pub struct TicketCodec {
    cipher: Arc<dyn CipherExecutor>,
}

impl TicketCodec {
    pub fn new(cipher: Arc<dyn CipherExecutor>) -> Self {
        Self { cipher }
    }

    /// A codec that never encrypts.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoOpCipherExecutor))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_enabled()
    }

    /// Maps a plaintext id to the key it is stored under.
    ///
    /// Disabled cipher or blank id: the id unchanged. Otherwise the lowercase
    /// hex SHA-512 digest of the id (always 128 characters).
    #[must_use]
    pub fn encode_ticket_id(&self, id: &str) -> String {
        if !self.is_enabled() {
            tracing::trace!("Ticket encryption is disabled, using plaintext id");
            return id.to_owned();
        }
        if id.trim().is_empty() {
            return id.to_owned();
        }
        hex::encode(Sha512::digest(id.as_bytes()))
    }

    /// Wraps a ticket for storage.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the ticket cannot be serialized or a
    /// crypto error if encryption fails.
    pub fn encode_ticket(&self, ticket: &Ticket) -> RegistryResult<StoredTicket> {
        if !self.is_enabled() {
            tracing::trace!("Ticket encryption is disabled, storing ticket as-is");
            return Ok(StoredTicket::Plain(ticket.clone()));
        }
        let payload = serde_json::to_vec(ticket)?;
        let encoded = self.cipher.encrypt(&payload)?;
        Ok(StoredTicket::Encoded(EncodedTicket { id: self.encode_ticket_id(ticket.id()), encoded }))
    }

    /// Reverses [`TicketCodec::encode_ticket`].
    ///
    /// An absent record decodes to `None`. Plain records are returned
    /// unchanged whatever the cipher state.
    ///
    /// # Errors
    ///
    /// Returns a crypto error if decryption fails or if an encoded record is
    /// read while the cipher is disabled, and a serialization error if the
    /// decrypted payload is not a ticket.
    pub fn decode_ticket(&self, record: Option<StoredTicket>) -> RegistryResult<Option<Ticket>> {
        let Some(record) = record else {
            if self.is_enabled() {
                tracing::warn!("Ticket record is absent and cannot be decoded");
            }
            return Ok(None);
        };
        match record {
            StoredTicket::Plain(ticket) => {
                if self.is_enabled() {
                    tracing::debug!(ticket_id = %ticket.id(), "Record is not encoded, no decoding necessary");
                } else {
                    tracing::trace!("Ticket encryption is disabled, returning record as-is");
                }
                Ok(Some(ticket))
            },
            StoredTicket::Encoded(encoded) => {
                if !self.is_enabled() {
                    return Err(CipherError::Disabled.into());
                }
                let payload = self.cipher.decrypt(&encoded.encoded)?;
                let ticket: Ticket = serde_json::from_slice(&payload)?;
                Ok(Some(ticket))
            },
        }
    }

    /// Decodes every record; fails on the first fault.
    ///
    /// # Errors
    ///
    /// See [`TicketCodec::decode_ticket`].
    pub fn decode_tickets(
        &self,
        records: impl IntoIterator<Item = StoredTicket>,
    ) -> RegistryResult<Vec<Ticket>> {
        records
            .into_iter()
            .filter_map(|record| self.decode_ticket(Some(record)).transpose())
            .collect()
    }
}

impl Default for TicketCodec {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{
        cipher::AeadCipherExecutor,
        error::RegistryError,
        ticket::{ExpirationPolicy, TicketGrantingTicket, TicketState},
    };

    fn enabled() -> TicketCodec {
        TicketCodec::new(Arc::new(AeadCipherExecutor::new(&[3u8; 32]).unwrap()))
    }

    fn ticket() -> Ticket {
        TicketGrantingTicket::builder()
            .id("TGT-1-abc-sso")
            .principal("casuser")
            .state(TicketState::new(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH))
            .expiration_policy(ExpirationPolicy::NeverExpires)
            .build()
            .into()
    }

    #[test]
    fn test_disabled_codec_passes_through() {
        let codec = TicketCodec::disabled();
        assert_eq!(codec.encode_ticket_id("TGT-1"), "TGT-1");
        let stored = codec.encode_ticket(&ticket()).unwrap();
        assert_eq!(stored, StoredTicket::Plain(ticket()));
        assert_eq!(codec.decode_ticket(Some(stored)).unwrap(), Some(ticket()));
    }

    #[test]
    fn test_encoded_id_is_sha512_hex() {
        let id = enabled().encode_ticket_id("TGT-1");
        assert_eq!(id.len(), 128);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(id, enabled().encode_ticket_id("TGT-1"));
    }

    #[test]
    fn test_blank_id_is_not_digested() {
        assert_eq!(enabled().encode_ticket_id(""), "");
        assert_eq!(enabled().encode_ticket_id("  "), "  ");
    }

    #[test]
    fn test_encoded_record_hides_plaintext() {
        let codec = enabled();
        let StoredTicket::Encoded(encoded) = codec.encode_ticket(&ticket()).unwrap() else {
            panic!("expected an encoded record");
        };
        assert_eq!(encoded.id, codec.encode_ticket_id("TGT-1-abc-sso"));
        let json = serde_json::to_string(&encoded).unwrap();
        assert!(!json.contains("casuser"));
        assert!(!format!("{encoded:?}").contains("casuser"));
    }

    #[test]
    fn test_absent_record_decodes_to_none() {
        assert_eq!(enabled().decode_ticket(None).unwrap(), None);
    }

    #[test]
    fn test_plain_record_passes_enabled_decoder() {
        let decoded = enabled().decode_ticket(Some(StoredTicket::Plain(ticket()))).unwrap();
        assert_eq!(decoded, Some(ticket()));
    }

    #[test]
    fn test_encoded_record_with_disabled_cipher_is_a_fault() {
        let stored = enabled().encode_ticket(&ticket()).unwrap();
        let err = TicketCodec::disabled().decode_ticket(Some(stored)).unwrap_err();
        assert!(matches!(err, RegistryError::Crypto(CipherError::Disabled)));
    }

    #[test]
    fn test_stored_record_survives_json() {
        let stored = enabled().encode_ticket(&ticket()).unwrap();
        let json = serde_json::to_vec(&stored).unwrap();
        let back: StoredTicket = serde_json::from_slice(&json).unwrap();
        assert_eq!(enabled().decode_ticket(Some(back)).unwrap(), Some(ticket()));
    }
}
