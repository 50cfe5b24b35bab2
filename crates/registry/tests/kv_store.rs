#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! The registry over a byte-level storage backend.

use std::time::Duration;

use sso_tickets_registry::{
    DefaultTicketRegistry, ExpirationPolicy, KvTicketStore, RegistryConfig, Ticket, TicketCount,
    TicketGrantingTicket, TicketRegistry, TicketStore,
    testutil::{encrypting_codec, session, store_session_hierarchy},
};
use sso_tickets_storage::{MemoryBackend, StorageBackend};

#[tokio::test]
async fn cascade_over_kv_backend() {
    let backend = MemoryBackend::new();
    let registry = DefaultTicketRegistry::new(KvTicketStore::with_default_prefix(backend.clone()));
    let hierarchy = store_session_hierarchy(&registry, "kv").await;

    assert_eq!(backend.len(), 7);
    assert_eq!(registry.session_count().await, TicketCount::Known(1));
    assert_eq!(registry.delete_ticket(&hierarchy.tgt).await.unwrap(), 7);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn registries_under_different_prefixes_are_isolated() {
    let backend = MemoryBackend::new();
    let first = DefaultTicketRegistry::new(KvTicketStore::new(backend.clone(), "east/"));
    let second = DefaultTicketRegistry::new(KvTicketStore::new(backend.clone(), "west/"));

    first.add_ticket(&session("TGT-1")).await.unwrap();
    second.add_ticket(&session("TGT-2")).await.unwrap();

    assert!(first.get_ticket("TGT-2").await.unwrap().is_none());
    assert_eq!(first.get_tickets().await.unwrap().len(), 1);
    assert_eq!(second.delete_all().await.unwrap(), 1);
    assert!(first.get_ticket("TGT-1").await.unwrap().is_some());
}

#[tokio::test]
async fn ticket_deadline_becomes_backend_ttl() {
    let backend = MemoryBackend::new();
    let registry = DefaultTicketRegistry::new(KvTicketStore::with_default_prefix(backend.clone()));
    let ticket: Ticket = TicketGrantingTicket::builder()
        .id("TGT-short")
        .principal("casuser")
        .expiration_policy(ExpirationPolicy::HardTimeout {
            time_to_kill: Duration::from_millis(200),
        })
        .build()
        .into();
    registry.add_ticket(&ticket).await.unwrap();
    assert!(backend.get(b"tickets/TGT-short").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(backend.get(b"tickets/TGT-short").await.unwrap().is_none());
    assert!(registry.get_ticket("TGT-short").await.unwrap().is_none());
}

#[tokio::test]
async fn non_expiring_ticket_has_no_backend_ttl() {
    let backend = MemoryBackend::new();
    let store = KvTicketStore::with_default_prefix(backend.clone());
    let registry = DefaultTicketRegistry::new(store);
    registry.add_ticket(&session("TGT-forever")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(registry.store().get("TGT-forever").await.unwrap().is_some());
}

#[tokio::test]
async fn encrypted_records_over_kv_backend() {
    let backend = MemoryBackend::new();
    let registry = DefaultTicketRegistry::with_codec(
        KvTicketStore::with_default_prefix(backend.clone()),
        encrypting_codec(),
    );
    let ticket = session("TGT-1");
    registry.add_ticket(&ticket).await.unwrap();

    let entries = backend.get_prefix(b"tickets/").await.unwrap();
    assert_eq!(entries.len(), 1);
    let key = String::from_utf8(entries[0].key.to_vec()).unwrap();
    assert_eq!(key.len(), "tickets/".len() + 128);
    assert!(!String::from_utf8_lossy(&entries[0].value).contains("casuser"));

    assert_eq!(registry.get_ticket("TGT-1").await.unwrap(), Some(ticket));
}

#[tokio::test]
async fn registry_from_config_uses_configured_prefix() {
    let config: RegistryConfig =
        serde_json::from_str(r#"{ "key_prefix": "sso/", "cleaner": { "enabled": false } }"#)
            .unwrap();
    let backend = MemoryBackend::new();
    let store = KvTicketStore::new(backend.clone(), config.key_prefix.clone());
    let registry = DefaultTicketRegistry::from_config(store, &config).unwrap();

    registry.add_ticket(&session("TGT-1")).await.unwrap();
    assert!(backend.get(b"sso/TGT-1").await.unwrap().is_some());
}
