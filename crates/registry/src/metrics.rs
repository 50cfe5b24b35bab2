//! Operation counters for a ticket registry.
//!
//! # Examples
//!
//! ```
//! use sso_tickets_registry::RegistryMetrics;
//!
//! let metrics = RegistryMetrics::new();
//! metrics.record_lookup(true);
//! metrics.record_lookup(false);
//! metrics.record_deleted(7);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.lookups, 2);
//! assert_eq!(snapshot.tickets_deleted, 7);
//! assert!((snapshot.hit_rate() - 0.5).abs() < f64::EPSILON);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Snapshot of registry metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct RegistryMetricsSnapshot {
    // Lookups
    /// Total `get_ticket` calls.
    #[builder(default)]
    pub lookups: u64,
    /// Lookups that returned a live ticket.
    #[builder(default)]
    pub hits: u64,
    /// Lookups that found nothing.
    #[builder(default)]
    pub misses: u64,
    /// Lookups that found a ticket its policy reports expired.
    #[builder(default)]
    pub expired_lookups: u64,

    // Writes
    /// Tickets added.
    #[builder(default)]
    pub adds: u64,
    /// Tickets updated.
    #[builder(default)]
    pub updates: u64,
    /// Cascading delete requests.
    #[builder(default)]
    pub delete_requests: u64,
    /// Tickets removed by cascading deletes, children included.
    #[builder(default)]
    pub tickets_deleted: u64,

    // Faults
    /// Typed lookups that hit a ticket of the wrong kind.
    #[builder(default)]
    pub type_mismatches: u64,
    /// Encode or decode failures.
    #[builder(default)]
    pub crypto_failures: u64,

    // Cleaner
    /// Completed cleaner passes.
    #[builder(default)]
    pub cleaner_runs: u64,
    /// Tickets removed by the cleaner, children included.
    #[builder(default)]
    pub cleaner_removed: u64,
}

impl RegistryMetricsSnapshot {
    /// Fraction of lookups that returned a live ticket (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 { 0.0 } else { self.hits as f64 / self.lookups as f64 }
    }
}

#[derive(Default)]
struct RegistryMetricsInner {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired_lookups: AtomicU64,
    adds: AtomicU64,
    updates: AtomicU64,
    delete_requests: AtomicU64,
    tickets_deleted: AtomicU64,
    type_mismatches: AtomicU64,
    crypto_failures: AtomicU64,
    cleaner_runs: AtomicU64,
    cleaner_removed: AtomicU64,
}

/// Metrics collector for registry operations.
///
/// Lock-free atomic counters. Clones share the same counters, so one
/// collector can be handed to a registry and its cleaner.
#[derive(Clone, Default)]
pub struct RegistryMetrics {
    inner: Arc<RegistryMetricsInner>,
}

impl RegistryMetrics {
    /// Creates a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lookup; `found` is whether a live ticket was returned.
    pub fn record_lookup(&self, found: bool) {
        self.inner.lookups.fetch_add(1, Ordering::Relaxed);
        if found {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records that a lookup found an expired ticket.
    pub fn record_expired_lookup(&self) {
        self.inner.expired_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_add(&self) {
        self.inner.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update(&self) {
        self.inner.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cascading delete request that removed `count` tickets.
    pub fn record_deleted(&self, count: usize) {
        self.inner.delete_requests.fetch_add(1, Ordering::Relaxed);
        self.inner.tickets_deleted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_type_mismatch(&self) {
        self.inner.type_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crypto_failure(&self) {
        self.inner.crypto_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed cleaner pass that removed `removed` tickets.
    pub fn record_cleaner_run(&self, removed: usize) {
        self.inner.cleaner_runs.fetch_add(1, Ordering::Relaxed);
        self.inner.cleaner_removed.fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Returns the current values of every counter.
    #[must_use]
    pub fn snapshot(&self) -> RegistryMetricsSnapshot {
        let inner = &self.inner;
        RegistryMetricsSnapshot::builder()
            .lookups(inner.lookups.load(Ordering::Relaxed))
            .hits(inner.hits.load(Ordering::Relaxed))
            .misses(inner.misses.load(Ordering::Relaxed))
            .expired_lookups(inner.expired_lookups.load(Ordering::Relaxed))
            .adds(inner.adds.load(Ordering::Relaxed))
            .updates(inner.updates.load(Ordering::Relaxed))
            .delete_requests(inner.delete_requests.load(Ordering::Relaxed))
            .tickets_deleted(inner.tickets_deleted.load(Ordering::Relaxed))
            .type_mismatches(inner.type_mismatches.load(Ordering::Relaxed))
            .crypto_failures(inner.crypto_failures.load(Ordering::Relaxed))
            .cleaner_runs(inner.cleaner_runs.load(Ordering::Relaxed))
            .cleaner_removed(inner.cleaner_removed.load(Ordering::Relaxed))
            .build()
    }
}

impl std::fmt::Debug for RegistryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RegistryMetrics").field(&self.snapshot()).finish()
    }
}
