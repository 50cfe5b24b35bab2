//! Counts that may not be measurable.

use std::fmt;

/// Value reported when a count cannot be measured.
pub const UNKNOWN_COUNT: i64 = i64::MIN;

/// Result of a full-scan count.
///
/// Counting never fails: a store that cannot enumerate, or that fails while
/// enumerating, yields a non-[`Known`](TicketCount::Known) variant instead of
/// an error. Both such variants report [`UNKNOWN_COUNT`] through
/// [`TicketCount::as_sentinel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TicketCount {
    /// The number of matching tickets in some snapshot taken during the scan.
    Known(u64),
    /// The store does not support enumeration.
    Unsupported,
    /// Enumeration failed.
    Unavailable,
}

impl TicketCount {
    /// The count, if it was measured.
    #[must_use]
    pub const fn known(self) -> Option<u64> {
        match self {
            Self::Known(count) => Some(count),
            Self::Unsupported | Self::Unavailable => None,
        }
    }

    /// The count as a signed integer, or [`UNKNOWN_COUNT`].
    #[must_use]
    pub fn as_sentinel(self) -> i64 {
        match self {
            Self::Known(count) => i64::try_from(count).unwrap_or(i64::MAX),
            Self::Unsupported | Self::Unavailable => UNKNOWN_COUNT,
        }
    }
}

impl From<TicketCount> for i64 {
    fn from(count: TicketCount) -> Self {
        count.as_sentinel()
    }
}

impl fmt::Display for TicketCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(count) => write!(f, "{count}"),
            Self::Unsupported => f.write_str("unknown (unsupported)"),
            Self::Unavailable => f.write_str("unknown (unavailable)"),
        }
    }
}
