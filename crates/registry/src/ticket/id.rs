//! Ticket id generation.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

use super::TicketKind;

/// Number of random bytes in every generated id.
const RANDOM_BYTES: usize = 32;

/// Default host suffix appended to generated ids.
pub const DEFAULT_SUFFIX: &str = "sso";

/// Generates unique ticket ids of the form `{PREFIX}-{counter}-{random}-{suffix}`.
///
/// The random part is 32 bytes from the operating system RNG, base64url
/// encoded without padding, so ids are safe to use in URLs. The counter only
/// makes ids from one process easier to tell apart in logs; uniqueness comes
/// from the random part.
#[derive(Debug)]
pub struct TicketIdGenerator {
    counter: AtomicU64,
    suffix: String,
}

impl TicketIdGenerator {
    /// Creates a generator that appends `suffix` (typically the host name).
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { counter: AtomicU64::new(1), suffix: suffix.into() }
    }

    /// Returns a fresh id for a ticket of `kind`.
    pub fn next_id(&self, kind: TicketKind) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut random = [0u8; RANDOM_BYTES];
        OsRng.fill_bytes(&mut random);
        format!(
            "{}-{}-{}-{}",
            kind.prefix(),
            counter,
            URL_SAFE_NO_PAD.encode(random),
            self.suffix
        )
    }
}

impl Default for TicketIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_id_layout() {
        let generator = TicketIdGenerator::new("node1");
        let id = generator.next_id(TicketKind::ServiceTicket);

        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "ST");
        assert_eq!(parts[1], "1");
        assert!(id.ends_with("-node1"));
    }

    #[test]
    fn test_ids_are_unique() {
        let generator = TicketIdGenerator::default();
        let ids: HashSet<String> =
            (0..1_000).map(|_| generator.next_id(TicketKind::TicketGrantingTicket)).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn test_prefix_per_kind() {
        let generator = TicketIdGenerator::default();
        assert!(generator.next_id(TicketKind::ProxyGrantingTicket).starts_with("PGT-"));
        assert!(generator.next_id(TicketKind::TicketGrantingTicket).starts_with("TGT-"));
        assert!(generator.next_id(TicketKind::ServiceTicket).ends_with("-sso"));
    }
}
