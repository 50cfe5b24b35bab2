//! Hierarchy-aware deletion layered on the registry primitives.
//!
//! Deleting a granting ticket removes everything it issued:
//!
//! 1. every service ticket in its `services` map;
//! 2. for a proxy-granting ticket, its entry in the issuer's
//!    `proxy_granting_tickets` (the issuer is updated, not deleted);
//!    for a session, every proxy-granting ticket it issued, recursively,
//!    after which the emptied map is persisted;
//! 3. the ticket itself.
//!
//! Only the root lookup hides expired tickets. Children are fetched with
//! [`TicketRegistry::find_ticket`], so an expired proxy-granting ticket is
//! still removed together with the proxy tickets it issued.
//!
//! A proxy-granting ticket's own `proxy_granting_tickets` are not followed:
//! deleting it leaves proxy chains issued from it to expire on their own.
//!
//! Children go before the parent, so an interrupted cascade leaves a parent
//! that still knows about whatever survived. Running a cascade again after
//! an interruption, or racing two cascades over the same tree, only ever
//! yields "not found" for already removed tickets. Parents are written back
//! with [`TicketRegistry::update_existing_ticket`], so a racing cascade never
//! recreates a ticket another caller already removed.
//!
//! The returned count covers every record this call removed. Updating an
//! issuer is not counted.

use std::{future::Future, pin::Pin};

use fail::fail_point;
use tracing::{debug, warn};

use crate::{
    error::RegistryResult,
    registry::TicketRegistry,
    ticket::{ProxyGrantingTicket, Ticket, TicketGrantingTicket},
};

type CascadeFuture<'a> = Pin<Box<dyn Future<Output = RegistryResult<usize>> + Send + 'a>>;

/// Deletes the ticket with the given id and everything it issued.
///
/// Returns `0` for a blank id or a ticket that is missing or expired.
///
/// # Errors
///
/// Propagates faults from looking up the ticket or its issuer, from
/// persisting an updated parent, and from deleting the ticket itself.
/// Failures to delete individual service tickets are logged and skipped.
pub async fn delete_ticket<R>(registry: &R, id: &str) -> RegistryResult<usize>
where
    R: TicketRegistry + ?Sized,
{
    if id.trim().is_empty() {
        return Ok(0);
    }
    let Some(ticket) = registry.get_ticket(id).await? else {
        debug!(ticket_id = %id, "Ticket not found, nothing to delete");
        return Ok(0);
    };
    delete_resolved(registry, ticket).await
}

/// Runs the cascade on a ticket that has already been fetched.
///
/// Used where the caller holds a ticket that [`TicketRegistry::get_ticket`]
/// would no longer return, such as an expired session found by the cleaner.
///
/// For a proxy-granting ticket this removes its service tickets and unlinks
/// it from its issuer; proxy-granting tickets it issued itself stay stored
/// until they expire or are deleted directly.
pub fn delete_resolved<R>(registry: &R, ticket: Ticket) -> CascadeFuture<'_>
where
    R: TicketRegistry + ?Sized,
{
    Box::pin(async move {
        let id = ticket.id().to_owned();
        let mut count = 0;

        match ticket {
            Ticket::ServiceTicket(_) => {},
            Ticket::ProxyGrantingTicket(pgt) => {
                debug!(ticket_id = %id, "Removing children of proxy-granting ticket");
                count += delete_services(registry, &pgt.granting).await;
                unlink_from_issuer(registry, &pgt).await?;
            },
            Ticket::TicketGrantingTicket(mut tgt) => {
                debug!(ticket_id = %id, "Removing children of ticket-granting ticket");
                count += delete_services(registry, &tgt).await;
                count += delete_proxy_granting_tickets(registry, &mut tgt).await?;
            },
        }

        fail_point!("cascade-before-delete-parent", |_| {
            Err(crate::error::RegistryError::Storage(sso_tickets_storage::StorageError::internal(
                "injected failure before deleting parent ticket",
            )))
        });

        debug!(ticket_id = %id, "Removing ticket from the registry");
        if registry.delete_single_ticket(&id).await? {
            count += 1;
        }
        Ok(count)
    })
}

/// Runs [`delete_ticket`] for every id and returns the total removed.
///
/// # Errors
///
/// Stops at the first cascade that fails.
pub async fn delete_tickets<R, I>(registry: &R, ids: I) -> RegistryResult<usize>
where
    R: TicketRegistry + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut total = 0;
    for id in ids {
        total += delete_ticket(registry, id.as_ref()).await?;
    }
    Ok(total)
}

async fn delete_services<R>(registry: &R, ticket: &TicketGrantingTicket) -> usize
where
    R: TicketRegistry + ?Sized,
{
    let mut count = 0;
    for service_ticket_id in ticket.services.keys() {
        match registry.delete_single_ticket(service_ticket_id).await {
            Ok(true) => {
                debug!(ticket_id = %service_ticket_id, "Removed service ticket");
                count += 1;
            },
            Ok(false) => {
                debug!(ticket_id = %service_ticket_id, "Service ticket already gone");
            },
            Err(e) => {
                warn!(ticket_id = %service_ticket_id, error = %e, "Unable to remove service ticket");
            },
        }
    }
    count
}

async fn delete_proxy_granting_tickets<R>(
    registry: &R,
    ticket: &mut TicketGrantingTicket,
) -> RegistryResult<usize>
where
    R: TicketRegistry + ?Sized,
{
    if ticket.proxy_granting_tickets.is_empty() {
        return Ok(0);
    }

    let mut count = 0;
    for pgt_id in ticket.proxy_granting_tickets.keys() {
        match registry.find_ticket(pgt_id).await? {
            Some(child) => count += delete_resolved(registry, child).await?,
            None => debug!(ticket_id = %pgt_id, "Proxy-granting ticket already gone"),
        }
    }

    debug!(ticket_id = %ticket.id, "Removing proxy-granting tickets from parent");
    ticket.proxy_granting_tickets.clear();
    if !registry.update_existing_ticket(&Ticket::TicketGrantingTicket(ticket.clone())).await? {
        debug!(ticket_id = %ticket.id, "Parent already removed, not persisting it");
    }
    Ok(count)
}

async fn unlink_from_issuer<R>(registry: &R, pgt: &ProxyGrantingTicket) -> RegistryResult<()>
where
    R: TicketRegistry + ?Sized,
{
    let Some(mut issuer) = registry.find_ticket(&pgt.ticket_granting_ticket).await? else {
        debug!(
            ticket_id = %pgt.id(),
            issuer = %pgt.ticket_granting_ticket,
            "Issuer not found, nothing to unlink"
        );
        return Ok(());
    };
    let Some(granting) = issuer.as_granting_mut() else {
        warn!(
            ticket_id = %pgt.id(),
            issuer = %pgt.ticket_granting_ticket,
            "Issuer is not a granting ticket, nothing to unlink"
        );
        return Ok(());
    };
    if granting.proxy_granting_tickets.remove(pgt.id()).is_some()
        && !registry.update_existing_ticket(&issuer).await?
    {
        debug!(
            ticket_id = %pgt.id(),
            issuer = %pgt.ticket_granting_ticket,
            "Issuer removed concurrently, nothing to unlink"
        );
    }
    Ok(())
}
