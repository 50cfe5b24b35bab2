//! Service tickets: single-service credentials derived from a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{ExpirationPolicy, TicketState};

/// Credential granting access to exactly one service.
///
/// Always a child of one granting ticket (a [`TicketGrantingTicket`] or a
/// [`ProxyGrantingTicket`]). The parent id is kept for audit only: service
/// tickets are removed top-down from the parent's `services` map and never
/// cascade upward.
///
/// A service ticket whose parent is a proxy-granting ticket is what the
/// protocol calls a proxy ticket.
///
/// [`TicketGrantingTicket`]: super::TicketGrantingTicket
/// [`ProxyGrantingTicket`]: super::ProxyGrantingTicket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceTicket {
    /// Unique ticket identifier.
    pub id: String,
    /// The service this ticket was issued for.
    pub service: String,
    /// Id of the granting ticket that issued this ticket.
    pub ticket_granting_ticket: String,
    /// Whether the ticket was issued right after the session was created.
    pub from_new_login: bool,
    /// Usage state.
    pub state: TicketState,
    /// Expiration policy.
    pub expiration_policy: ExpirationPolicy,
}

impl ServiceTicket {
    /// Records a validation attempt at `now` and reports whether the ticket
    /// was issued for `service`.
    ///
    /// The use is counted even when the service does not match, so a
    /// single-use ticket cannot be probed against several services.
    pub fn validate_for(&mut self, service: &str, now: DateTime<Utc>) -> bool {
        self.state.update(now);
        self.service == service
    }
}
