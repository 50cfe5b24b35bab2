//! Periodic removal of expired tickets.
//!
//! Expired tickets are invisible to lookups, so they can only be removed by
//! something that enumerates the store. The cleaner does that on an interval
//! and removes each expired ticket with the cascade, so an expired session
//! takes the tickets it issued with it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cascade, config::CleanerConfig, error::RegistryResult, registry::DefaultTicketRegistry,
    store::TicketStore, ticket::TicketKind,
};

/// Removes expired tickets from a [`DefaultTicketRegistry`].
#[derive(Debug)]
pub struct TicketRegistryCleaner<S> {
    registry: Arc<DefaultTicketRegistry<S>>,
}

impl<S> Clone for TicketRegistryCleaner<S> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry) }
    }
}

impl<S: TicketStore + 'static> TicketRegistryCleaner<S> {
    pub fn new(registry: Arc<DefaultTicketRegistry<S>>) -> Self {
        Self { registry }
    }

    /// Runs one pass and returns the number of tickets removed, children
    /// included.
    ///
    /// Granting tickets are processed before service tickets so that an
    /// expired session accounts for its own children. A ticket whose cascade
    /// fails is logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails only if the expired tickets cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn clean(&self) -> RegistryResult<usize> {
        let mut expired = self.registry.expired_tickets().await?;
        if expired.is_empty() {
            debug!("No expired tickets found");
            self.registry.metrics().record_cleaner_run(0);
            return Ok(0);
        }
        expired.sort_by_key(|ticket| ticket.kind() == TicketKind::ServiceTicket);

        let mut removed = 0;
        for ticket in expired {
            let id = ticket.id().to_owned();
            match cascade::delete_resolved(self.registry.as_ref(), ticket).await {
                Ok(count) => removed += count,
                Err(e) => warn!(ticket_id = %id, error = %e, "Failed to remove expired ticket"),
            }
        }

        info!(removed, "Removed expired tickets");
        self.registry.metrics().record_cleaner_run(removed);
        Ok(removed)
    }

    /// Starts the background loop.
    ///
    /// Waits `start_delay`, then runs [`clean`](Self::clean) every
    /// `interval` until `token` is cancelled. A failed pass is logged and the
    /// loop continues. Returns `None` if the cleaner is disabled.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn spawn(self, config: &CleanerConfig, token: CancellationToken) -> Option<JoinHandle<()>> {
        if !config.enabled {
            info!("Ticket registry cleaner is disabled");
            return None;
        }
        let start_delay = config.start_delay;
        let interval = config.interval;

        Some(tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(start_delay) => {},
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        info!("Ticket registry cleaner shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.clean().await {
                            warn!(error = %e, "Ticket registry cleaner pass failed");
                        }
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::{
        registry::TicketRegistry,
        store::MemoryTicketStore,
        ticket::{ExpirationPolicy, Ticket, TicketGrantingTicket, TicketState},
    };

    fn expired_session(id: &str) -> TicketGrantingTicket {
        TicketGrantingTicket::builder()
            .id(id)
            .principal("casuser")
            .state(TicketState::new(Utc::now() - TimeDelta::hours(2)))
            .expiration_policy(ExpirationPolicy::HardTimeout {
                time_to_kill: Duration::from_secs(3600),
            })
            .build()
    }

    #[tokio::test]
    async fn test_clean_cascades_from_expired_session() {
        let store = MemoryTicketStore::new();
        let registry = Arc::new(DefaultTicketRegistry::new(store.clone()));

        let mut session = expired_session("TGT-1");
        let st = session.grant_service_ticket(
            "ST-1",
            "https://a",
            ExpirationPolicy::NeverExpires,
            Utc::now(),
        );
        registry.add_ticket(&Ticket::from(session)).await.unwrap();
        registry.add_ticket(&st.into()).await.unwrap();
        let live = TicketGrantingTicket::builder()
            .id("TGT-2")
            .principal("other")
            .expiration_policy(ExpirationPolicy::NeverExpires)
            .build();
        registry.add_ticket(&live.into()).await.unwrap();

        let cleaner = TicketRegistryCleaner::new(Arc::clone(&registry));
        assert_eq!(cleaner.clean().await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(registry.get_ticket("TGT-2").await.unwrap().is_some());

        assert_eq!(cleaner.clean().await.unwrap(), 0);
        assert_eq!(registry.metrics().snapshot().cleaner_runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_cleaner_runs_until_cancelled() {
        let store = MemoryTicketStore::new();
        let registry = Arc::new(DefaultTicketRegistry::new(store.clone()));
        registry.add_ticket(&Ticket::from(expired_session("TGT-1"))).await.unwrap();

        let token = CancellationToken::new();
        let config = CleanerConfig::builder()
            .start_delay(Duration::from_secs(1))
            .interval(Duration::from_secs(5))
            .build();
        let handle = TicketRegistryCleaner::new(Arc::clone(&registry))
            .spawn(&config, token.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.is_empty());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_cleaner_does_not_spawn() {
        let registry = Arc::new(DefaultTicketRegistry::new(MemoryTicketStore::new()));
        let config = CleanerConfig::builder().enabled(false).build();
        let handle = TicketRegistryCleaner::new(registry).spawn(&config, CancellationToken::new());
        assert!(handle.is_none());
    }
}
