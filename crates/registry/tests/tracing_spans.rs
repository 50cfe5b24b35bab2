//! Integration test verifying that registry operations produce spans that
//! carry ticket ids and never ticket payloads.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    fmt::Write as _,
    sync::{Arc, Mutex},
};

use sso_tickets_registry::{
    DefaultTicketRegistry, MemoryTicketStore, TicketKind, TicketRegistry,
    testutil::store_session_hierarchy,
};
use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer that records span names and their fields
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<(String, String)>>>,
}

struct FieldRecorder<'a>(&'a mut String);

impl Visit for FieldRecorder<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut fields = String::new();
            attrs.record(&mut FieldRecorder(&mut fields));
            self.spans.lock().expect("lock poisoned").push((span.name().to_owned(), fields));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registry_operations_produce_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let registry = DefaultTicketRegistry::new(MemoryTicketStore::new());
    let hierarchy = store_session_hierarchy(&registry, "span").await;

    let ticket = registry.get_ticket(&hierarchy.tgt).await.unwrap().unwrap();
    registry.update_ticket(&ticket).await.unwrap();
    let _ = registry.get_ticket_of_kind(&hierarchy.tgt, TicketKind::ServiceTicket).await;
    let _ = registry.get_tickets().await;
    registry.delete_ticket(&hierarchy.tgt).await.unwrap();
    registry.delete_all().await.unwrap();

    let recorded = spans.lock().expect("lock poisoned");
    let expected = [
        "add_ticket",
        "get_ticket",
        "update_ticket",
        "get_ticket_of_kind",
        "get_tickets",
        "delete_ticket",
        "find_ticket",
        "update_existing_ticket",
        "delete_single_ticket",
        "delete_all",
    ];
    for name in &expected {
        assert!(
            recorded.iter().any(|(s, _)| s == name),
            "missing span '{name}', recorded: {recorded:?}"
        );
    }

    assert!(
        recorded
            .iter()
            .any(|(name, fields)| name == "delete_ticket" && fields.contains(&hierarchy.tgt)),
        "delete_ticket span should carry the ticket id"
    );
    assert!(
        recorded.iter().all(|(_, fields)| !fields.contains("casuser")),
        "spans must not carry ticket payloads"
    );
}
