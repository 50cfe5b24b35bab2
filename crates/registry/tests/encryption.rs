#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Encryption at rest through the codec and the registry.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use proptest::prelude::*;
use sso_tickets_registry::{
    CipherError, DefaultTicketRegistry, ExpirationPolicy, MemoryTicketStore, RegistryError,
    StoredTicket, Ticket, TicketCodec, TicketGrantingTicket, TicketRegistry, TicketStore,
    assert_registry_error,
    testutil::{FailingCipher, encrypting_codec, session},
};

fn granting_ticket(id: &str, principal: &str, services: &[(String, String)]) -> Ticket {
    let mut tgt = TicketGrantingTicket::builder()
        .id(id)
        .principal(principal)
        .expiration_policy(ExpirationPolicy::TicketGrantingTicket {
            max_time_to_live: Duration::from_secs(8 * 3600),
            time_to_kill: Duration::from_secs(7200),
        })
        .build();
    tgt.services.extend(services.iter().cloned());
    tgt.into()
}

#[tokio::test]
async fn stored_record_is_keyed_by_digest_and_opaque() {
    let store = MemoryTicketStore::new();
    let registry = DefaultTicketRegistry::with_codec(store.clone(), encrypting_codec());
    let ticket = granting_ticket("TGT-1-secret", "alice", &[]);
    registry.add_ticket(&ticket).await.unwrap();

    assert!(store.get("TGT-1-secret").await.unwrap().is_none());
    let key = registry.codec().encode_ticket_id("TGT-1-secret");
    let Some(StoredTicket::Encoded(encoded)) = store.get(&key).await.unwrap() else {
        panic!("expected an encoded record under the digest");
    };
    let json = serde_json::to_string(&encoded).unwrap();
    assert!(!json.contains("alice"));
    assert!(!json.contains("TGT-1-secret"));

    assert_eq!(registry.get_ticket("TGT-1-secret").await.unwrap(), Some(ticket));
}

#[test]
fn blank_id_is_returned_unchanged_in_both_modes() {
    assert_eq!(encrypting_codec().encode_ticket_id(""), "");
    assert_eq!(TicketCodec::disabled().encode_ticket_id(""), "");
}

#[tokio::test]
async fn encryption_fault_never_stores_plaintext() {
    let store = MemoryTicketStore::new();
    let registry =
        DefaultTicketRegistry::with_codec(store.clone(), TicketCodec::new(Arc::new(FailingCipher)));

    let result = registry.add_ticket(&session("TGT-1")).await;
    assert_registry_error!(result, Crypto);
    assert!(store.is_empty());
    assert_eq!(registry.metrics().snapshot().crypto_failures, 1);
}

#[tokio::test]
async fn decryption_fault_propagates_from_lookup() {
    let store = MemoryTicketStore::new();
    let writer = DefaultTicketRegistry::with_codec(store.clone(), encrypting_codec());
    writer.add_ticket(&session("TGT-1")).await.unwrap();

    let reader =
        DefaultTicketRegistry::with_codec(store.clone(), TicketCodec::new(Arc::new(FailingCipher)));
    let result = reader.get_ticket("TGT-1").await;
    assert!(matches!(result, Err(RegistryError::Crypto(CipherError::Decrypt))));
}

#[tokio::test]
async fn plaintext_records_stay_readable_after_enabling_encryption() {
    let store = MemoryTicketStore::new();
    let plain = DefaultTicketRegistry::new(store.clone());
    let ticket = session("TGT-1");
    plain.add_ticket(&ticket).await.unwrap();

    let encrypted = DefaultTicketRegistry::with_codec(store.clone(), encrypting_codec());
    assert_eq!(encrypted.get_tickets().await.unwrap(), vec![ticket]);
}

#[test]
fn decode_tickets_handles_mixed_records() {
    let codec = encrypting_codec();
    let a = session("TGT-a");
    let b = session("TGT-b");
    let records = vec![codec.encode_ticket(&a).unwrap(), StoredTicket::Plain(b.clone())];

    let mut decoded = codec.decode_tickets(records).unwrap();
    decoded.sort_by(|x, y| x.id().cmp(y.id()));
    assert_eq!(decoded, vec![a, b]);
}

proptest! {
    #[test]
    fn encoded_id_is_deterministic_fixed_length_hex(id in "[A-Za-z0-9-]{1,64}") {
        let codec = encrypting_codec();
        let first = codec.encode_ticket_id(&id);
        prop_assert_eq!(first.len(), 128);
        prop_assert!(first.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        prop_assert_eq!(first, codec.encode_ticket_id(&id));
    }

    #[test]
    fn decode_reverses_encode(
        id in "TGT-[0-9]{1,6}-[A-Za-z0-9_-]{8,43}-sso",
        principal in "[a-z]{1,16}",
        services in prop::collection::vec(("ST-[0-9]{1,6}", "https://[a-z]{1,12}\\.example\\.com"), 0..8),
    ) {
        let codec = encrypting_codec();
        let ticket = granting_ticket(&id, &principal, &services);
        let stored = codec.encode_ticket(&ticket).unwrap();
        prop_assert!(matches!(stored, StoredTicket::Encoded(_)));
        prop_assert_eq!(codec.decode_ticket(Some(stored)).unwrap(), Some(ticket));
    }
}

#[tokio::test]
async fn service_ticket_round_trips_through_encrypted_registry() {
    let registry = DefaultTicketRegistry::with_codec(MemoryTicketStore::new(), encrypting_codec());
    let mut tgt = TicketGrantingTicket::builder()
        .id("TGT-1")
        .principal("casuser")
        .expiration_policy(ExpirationPolicy::NeverExpires)
        .build();
    let st = tgt.grant_service_ticket(
        "ST-1",
        "https://app.example.com",
        ExpirationPolicy::MultiUseOrTimeout {
            number_of_uses: 1,
            time_to_kill: Duration::from_secs(10),
        },
        Utc::now(),
    );
    registry.add_ticket(&Ticket::from(st.clone())).await.unwrap();

    assert_eq!(registry.get_ticket("ST-1").await.unwrap(), Some(Ticket::from(st)));
}
