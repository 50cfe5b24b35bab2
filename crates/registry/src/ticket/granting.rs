//! Granting tickets: sessions and the proxy credentials issued from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    service::ServiceTicket,
    state::{ExpirationPolicy, TicketState},
};

/// Root credential of an authenticated session.
///
/// `services` and `proxy_granting_tickets` are the only authoritative record
/// of this ticket's children. Both maps are keyed by child ticket id and hold
/// the service the child was issued for. Children are referenced by id only;
/// the registry resolves them through the backend.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use sso_tickets_registry::{ExpirationPolicy, TicketGrantingTicket};
///
/// let mut tgt = TicketGrantingTicket::builder()
///     .id("TGT-1")
///     .principal("casuser")
///     .expiration_policy(ExpirationPolicy::NeverExpires)
///     .build();
///
/// let st = tgt.grant_service_ticket(
///     "ST-1",
///     "https://app.example.com",
///     ExpirationPolicy::NeverExpires,
///     Utc::now(),
/// );
///
/// assert_eq!(st.ticket_granting_ticket, "TGT-1");
/// assert!(tgt.services.contains_key("ST-1"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct TicketGrantingTicket {
    /// Unique ticket identifier.
    #[builder(into)]
    pub id: String,

    /// Identifier of the authenticated principal.
    #[builder(into)]
    pub principal: String,

    /// Usage state.
    #[builder(default = TicketState::new(Utc::now()))]
    pub state: TicketState,

    /// Expiration policy.
    pub expiration_policy: ExpirationPolicy,

    /// Service ticket id → service, for every service access granted.
    #[builder(default)]
    pub services: BTreeMap<String, String>,

    /// Proxy-granting ticket id → service, for every proxy credential issued.
    #[builder(default)]
    pub proxy_granting_tickets: BTreeMap<String, String>,
}

impl TicketGrantingTicket {
    /// Issues a service ticket for `service` and records it as a child.
    ///
    /// Counts as a use of this ticket.
    pub fn grant_service_ticket(
        &mut self,
        id: impl Into<String>,
        service: impl Into<String>,
        expiration_policy: ExpirationPolicy,
        now: DateTime<Utc>,
    ) -> ServiceTicket {
        let id = id.into();
        let service = service.into();
        let from_new_login = self.state.usage_count == 0;

        self.state.update(now);
        self.services.insert(id.clone(), service.clone());

        ServiceTicket {
            id,
            service,
            ticket_granting_ticket: self.id.clone(),
            from_new_login,
            state: TicketState::new(now),
            expiration_policy,
        }
    }

    /// Issues a proxy-granting ticket on behalf of `service` and records it
    /// as a child.
    pub fn grant_proxy_granting_ticket(
        &mut self,
        id: impl Into<String>,
        service: impl Into<String>,
        expiration_policy: ExpirationPolicy,
        now: DateTime<Utc>,
    ) -> ProxyGrantingTicket {
        let id = id.into();
        let service = service.into();

        self.proxy_granting_tickets.insert(id.clone(), service.clone());

        ProxyGrantingTicket {
            granting: TicketGrantingTicket {
                id,
                principal: self.principal.clone(),
                state: TicketState::new(now),
                expiration_policy,
                services: BTreeMap::new(),
                proxy_granting_tickets: BTreeMap::new(),
            },
            proxied_by: service,
            ticket_granting_ticket: self.id.clone(),
        }
    }

    /// Returns `true` if this ticket has no recorded children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.services.is_empty() && self.proxy_granting_tickets.is_empty()
    }
}

/// Proxy credential issued from a granting ticket.
///
/// Behaves as a [`TicketGrantingTicket`] (it can grant its own service and
/// proxy tickets, tracked in `granting`) and additionally points back at the
/// ticket that issued it. It appears exactly once in the issuer's
/// `proxy_granting_tickets` map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyGrantingTicket {
    /// The granting behaviour and children of this proxy credential.
    pub granting: TicketGrantingTicket,
    /// The service this credential was issued for.
    pub proxied_by: String,
    /// Id of the issuing granting ticket.
    pub ticket_granting_ticket: String,
}

impl ProxyGrantingTicket {
    /// Unique ticket identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.granting.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn session() -> TicketGrantingTicket {
        TicketGrantingTicket::builder()
            .id("TGT-1")
            .principal("casuser")
            .expiration_policy(ExpirationPolicy::NeverExpires)
            .build()
    }

    #[test]
    fn test_grant_service_ticket_records_child() {
        let mut tgt = session();
        let now = Utc::now();

        let first = tgt.grant_service_ticket("ST-1", "https://a", ExpirationPolicy::NeverExpires, now);
        let second =
            tgt.grant_service_ticket("ST-2", "https://b", ExpirationPolicy::NeverExpires, now);

        assert!(first.from_new_login);
        assert!(!second.from_new_login);
        assert_eq!(tgt.services.get("ST-2").map(String::as_str), Some("https://b"));
        assert_eq!(tgt.state.usage_count, 2);
    }

    #[test]
    fn test_grant_proxy_granting_ticket_links_both_ways() {
        let mut tgt = session();
        let pgt = tgt.grant_proxy_granting_ticket(
            "PGT-1",
            "https://proxy",
            ExpirationPolicy::NeverExpires,
            Utc::now(),
        );

        assert_eq!(pgt.ticket_granting_ticket, "TGT-1");
        assert_eq!(pgt.id(), "PGT-1");
        assert_eq!(pgt.granting.principal, "casuser");
        assert!(pgt.granting.is_leaf());
        assert!(tgt.proxy_granting_tickets.contains_key("PGT-1"));
    }

    #[test]
    fn test_proxy_granting_ticket_grants_proxy_tickets() {
        let mut tgt = session();
        let mut pgt = tgt.grant_proxy_granting_ticket(
            "PGT-1",
            "https://proxy",
            ExpirationPolicy::NeverExpires,
            Utc::now(),
        );

        let pt = pgt.granting.grant_service_ticket(
            "ST-9",
            "https://backend",
            ExpirationPolicy::NeverExpires,
            Utc::now(),
        );

        assert_eq!(pt.ticket_granting_ticket, "PGT-1");
        assert!(pgt.granting.services.contains_key("ST-9"));
        assert!(tgt.services.is_empty(), "proxy tickets belong to the proxy, not the session");
    }

    #[test]
    fn test_service_ticket_validation_counts_use() {
        let mut tgt = session();
        let now = Utc::now();
        let mut st = tgt.grant_service_ticket("ST-1", "https://a", ExpirationPolicy::NeverExpires, now);

        assert!(!st.validate_for("https://other", now));
        assert!(st.validate_for("https://a", now));
        assert_eq!(st.state.usage_count, 2);
    }
}
