//! Usage state and expiration policies shared by every ticket variant.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Mutable usage bookkeeping carried by every ticket.
///
/// Identity never changes, but this state does: each use of a ticket bumps
/// the counter and the last-used timestamp, and expiration policies evaluate
/// against it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketState {
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
    /// When the ticket was last used (creation counts as a use of time).
    pub last_used_at: DateTime<Utc>,
    /// The use before `last_used_at`, if any.
    pub previous_used_at: Option<DateTime<Utc>>,
    /// Number of times the ticket has been used.
    pub usage_count: u32,
    /// Set once the ticket has been explicitly expired. Never cleared.
    pub expired: bool,
}

impl TicketState {
    /// Fresh state for a ticket created at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_used_at: now,
            previous_used_at: None,
            usage_count: 0,
            expired: false,
        }
    }

    /// Records a use of the ticket at `now`.
    pub fn update(&mut self, now: DateTime<Utc>) {
        self.previous_used_at = Some(self.last_used_at);
        self.last_used_at = now;
        self.usage_count = self.usage_count.saturating_add(1);
    }

    /// Marks the ticket as expired regardless of its policy.
    pub fn mark_expired(&mut self) {
        self.expired = true;
    }
}

/// Predicate deciding whether a ticket is still valid.
///
/// Serialized with the ticket so the policy travels with it through storage
/// and encryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ExpirationPolicy {
    /// The ticket never expires on its own.
    NeverExpires,

    /// Expires a fixed time after creation.
    HardTimeout {
        /// Lifetime measured from creation.
        #[serde(with = "humantime_serde")]
        time_to_kill: Duration,
    },

    /// Expires after a period of inactivity (sliding window).
    Timeout {
        /// Idle window measured from the last use.
        #[serde(with = "humantime_serde")]
        time_to_kill: Duration,
    },

    /// Expires after a number of uses or a fixed time after creation,
    /// whichever comes first. The usual policy for service tickets.
    MultiUseOrTimeout {
        /// Uses allowed before the ticket expires.
        number_of_uses: u32,
        /// Lifetime measured from creation.
        #[serde(with = "humantime_serde")]
        time_to_kill: Duration,
    },

    /// Session policy: a hard cap since creation plus an idle window.
    TicketGrantingTicket {
        /// Maximum lifetime measured from creation.
        #[serde(with = "humantime_serde")]
        max_time_to_live: Duration,
        /// Idle window measured from the last use.
        #[serde(with = "humantime_serde")]
        time_to_kill: Duration,
    },
}

impl ExpirationPolicy {
    /// Returns `true` if a ticket with `state` is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool {
        if state.expired {
            return true;
        }
        match self {
            Self::MultiUseOrTimeout { number_of_uses, .. }
                if state.usage_count >= *number_of_uses =>
            {
                true
            },
            _ => self.expires_at(state).is_some_and(|deadline| now >= deadline),
        }
    }

    /// The instant at which the ticket expires if nothing else happens.
    ///
    /// `None` for tickets that never time out. A deadline beyond the
    /// representable range is also treated as `None`.
    #[must_use]
    pub fn expires_at(&self, state: &TicketState) -> Option<DateTime<Utc>> {
        match self {
            Self::NeverExpires => None,
            Self::HardTimeout { time_to_kill } => deadline(state.created_at, *time_to_kill),
            Self::Timeout { time_to_kill } => deadline(state.last_used_at, *time_to_kill),
            Self::MultiUseOrTimeout { time_to_kill, .. } => {
                deadline(state.created_at, *time_to_kill)
            },
            Self::TicketGrantingTicket { max_time_to_live, time_to_kill } => {
                let hard = deadline(state.created_at, *max_time_to_live);
                let idle = deadline(state.last_used_at, *time_to_kill);
                match (hard, idle) {
                    (Some(hard), Some(idle)) => Some(hard.min(idle)),
                    (hard, idle) => hard.or(idle),
                }
            },
        }
    }

    /// Remaining lifetime at `now`, used as a storage TTL hint.
    ///
    /// Returns `Some(Duration::ZERO)` for tickets already past their deadline
    /// and `None` when there is no deadline.
    #[must_use]
    pub fn time_to_live(&self, state: &TicketState, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at(state)
            .map(|deadline| (deadline - now).to_std().unwrap_or(Duration::ZERO))
    }
}

fn deadline(start: DateTime<Utc>, lifetime: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(lifetime).ok().and_then(|delta| start.checked_add_signed(delta))
}
