//! The ticket hierarchy.
//!
//! ```text
//! TicketGrantingTicket ──┬── services ───────────────► ServiceTicket*
//!                        └── proxy_granting_tickets ──► ProxyGrantingTicket*
//!                                                         ├── services ──► ServiceTicket*
//!                                                         └── proxy_granting_tickets ──► …
//! ```
//!
//! Relations are by id only. Parents own the authoritative record of their
//! children; the registry resolves ids through the store.

mod granting;
mod id;
mod service;
mod state;

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use granting::{ProxyGrantingTicket, TicketGrantingTicket};
pub use id::TicketIdGenerator;
pub use service::ServiceTicket;
pub use state::{ExpirationPolicy, TicketState};

/// Discriminant of the closed ticket variant set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Root session credential.
    TicketGrantingTicket,
    /// Single-service credential.
    ServiceTicket,
    /// Proxy credential, a specialization of [`TicketKind::TicketGrantingTicket`].
    ProxyGrantingTicket,
}

impl TicketKind {
    /// Id prefix used for tickets of this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::TicketGrantingTicket => "TGT",
            Self::ServiceTicket => "ST",
            Self::ProxyGrantingTicket => "PGT",
        }
    }

    /// Returns `true` if a ticket of kind `actual` satisfies a request for
    /// `self`.
    ///
    /// Every kind accepts itself; a ticket-granting request also accepts a
    /// proxy-granting ticket.
    #[must_use]
    pub const fn is_assignable_from(self, actual: TicketKind) -> bool {
        matches!(
            (self, actual),
            (Self::TicketGrantingTicket, Self::TicketGrantingTicket | Self::ProxyGrantingTicket)
                | (Self::ServiceTicket, Self::ServiceTicket)
                | (Self::ProxyGrantingTicket, Self::ProxyGrantingTicket)
        )
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TicketGrantingTicket => "TicketGrantingTicket",
            Self::ServiceTicket => "ServiceTicket",
            Self::ProxyGrantingTicket => "ProxyGrantingTicket",
        };
        f.write_str(name)
    }
}

/// A ticket of any kind.
///
/// Serialized with an internal `type` tag so stored payloads are
/// self-describing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ticket {
    /// Root session credential.
    TicketGrantingTicket(TicketGrantingTicket),
    /// Single-service credential.
    ServiceTicket(ServiceTicket),
    /// Proxy credential.
    ProxyGrantingTicket(ProxyGrantingTicket),
}

impl Ticket {
    /// Unique ticket identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::TicketGrantingTicket(tgt) => &tgt.id,
            Self::ServiceTicket(st) => &st.id,
            Self::ProxyGrantingTicket(pgt) => pgt.id(),
        }
    }

    /// The concrete kind of this ticket.
    #[must_use]
    pub const fn kind(&self) -> TicketKind {
        match self {
            Self::TicketGrantingTicket(_) => TicketKind::TicketGrantingTicket,
            Self::ServiceTicket(_) => TicketKind::ServiceTicket,
            Self::ProxyGrantingTicket(_) => TicketKind::ProxyGrantingTicket,
        }
    }

    /// The granting part of a TGT or PGT; `None` for service tickets.
    #[must_use]
    pub fn as_granting(&self) -> Option<&TicketGrantingTicket> {
        match self {
            Self::TicketGrantingTicket(tgt) => Some(tgt),
            Self::ProxyGrantingTicket(pgt) => Some(&pgt.granting),
            Self::ServiceTicket(_) => None,
        }
    }

    /// Mutable access to the granting part of a TGT or PGT.
    pub fn as_granting_mut(&mut self) -> Option<&mut TicketGrantingTicket> {
        match self {
            Self::TicketGrantingTicket(tgt) => Some(tgt),
            Self::ProxyGrantingTicket(pgt) => Some(&mut pgt.granting),
            Self::ServiceTicket(_) => None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TicketState {
        match self {
            Self::TicketGrantingTicket(tgt) => &tgt.state,
            Self::ServiceTicket(st) => &st.state,
            Self::ProxyGrantingTicket(pgt) => &pgt.granting.state,
        }
    }

    pub fn state_mut(&mut self) -> &mut TicketState {
        match self {
            Self::TicketGrantingTicket(tgt) => &mut tgt.state,
            Self::ServiceTicket(st) => &mut st.state,
            Self::ProxyGrantingTicket(pgt) => &mut pgt.granting.state,
        }
    }

    #[must_use]
    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        match self {
            Self::TicketGrantingTicket(tgt) => &tgt.expiration_policy,
            Self::ServiceTicket(st) => &st.expiration_policy,
            Self::ProxyGrantingTicket(pgt) => &pgt.granting.expiration_policy,
        }
    }

    /// Returns `true` if the ticket's policy reports it expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_policy().is_expired(self.state(), now)
    }

    /// Marks the ticket as expired regardless of its policy.
    pub fn mark_expired(&mut self) {
        self.state_mut().mark_expired();
    }

    /// Remaining lifetime at `now`, if the policy has a deadline.
    #[must_use]
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expiration_policy().time_to_live(self.state(), now)
    }
}

impl From<TicketGrantingTicket> for Ticket {
    fn from(ticket: TicketGrantingTicket) -> Self {
        Self::TicketGrantingTicket(ticket)
    }
}

impl From<ServiceTicket> for Ticket {
    fn from(ticket: ServiceTicket) -> Self {
        Self::ServiceTicket(ticket)
    }
}

impl From<ProxyGrantingTicket> for Ticket {
    fn from(ticket: ProxyGrantingTicket) -> Self {
        Self::ProxyGrantingTicket(ticket)
    }
}
