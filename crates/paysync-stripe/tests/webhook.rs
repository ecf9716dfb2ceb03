//! Stripe webhook verification, mapping and ingestion.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use paysync_core::{EntityType, SyncRecord, WebhookData, WorkspaceId};
use paysync_store::{MemoryStore, Store};
use paysync_stripe::{sign_payload, StripeProvider, PROVIDER_NAME};
use paysync_sync::{
    Credentials, IngestStage, PaymentProvider, SyncContext, UpsertAction, WebhookError,
    WebhookProcessor,
};

use common::{event, offline_provider, stripe_customer, stripe_product, API_KEY, WEBHOOK_SECRET};

fn signed(body: &[u8]) -> String {
    sign_payload(WEBHOOK_SECRET, body, Utc::now().timestamp())
}

#[test]
fn verified_customer_event_is_mapped() {
    let stripe = offline_provider();
    let body = event("evt_1", "customer.updated", stripe_customer("cus_1"));

    let event = stripe.handle_webhook(&body, &signed(&body)).unwrap();

    assert!(event.signature_valid);
    assert_eq!(event.provider, PROVIDER_NAME);
    assert_eq!(event.provider_event_id, "evt_1");
    assert_eq!(event.event_type, "customer.updated");
    assert_eq!(event.raw_data, body);
    match event.data {
        Some(WebhookData::Customer(customer)) => {
            assert_eq!(customer.external_id(), "cus_1");
            assert_eq!(customer.email.as_deref(), Some("cus_1@example.com"));
        }
        other => panic!("expected customer, got {other:?}"),
    }
}

#[test]
fn bad_signature_returns_unverified_event() {
    let stripe = offline_provider();
    let body = event("evt_1", "customer.updated", stripe_customer("cus_1"));
    let header = sign_payload("whsec_someone_else", &body, Utc::now().timestamp());

    let err = stripe.handle_webhook(&body, &header).unwrap_err();

    assert!(matches!(err, WebhookError::InvalidSignature { .. }));
    assert_eq!(err.stage(), IngestStage::Received);
    let unverified = err.unverified_event().unwrap();
    assert!(!unverified.signature_valid);
    assert!(unverified.data.is_none());
    assert_eq!(unverified.raw_data, body);
}

#[test]
fn garbage_header_is_rejected() {
    let stripe = offline_provider();
    let body = event("evt_1", "customer.updated", stripe_customer("cus_1"));
    let err = stripe.handle_webhook(&body, "not-a-signature").unwrap_err();
    assert!(matches!(err, WebhookError::InvalidSignature { .. }));
}

#[test]
fn stale_timestamp_is_rejected_unless_tolerance_disabled() {
    let body = event("evt_1", "product.created", stripe_product("prod_1"));
    let header = sign_payload(WEBHOOK_SECRET, &body, Utc::now().timestamp() - 3_600);

    let stripe = offline_provider();
    let err = stripe.handle_webhook(&body, &header).unwrap_err();
    assert!(matches!(
        err,
        WebhookError::InvalidSignature { ref reason, .. } if reason.contains("tolerance")
    ));

    let lenient = offline_provider().with_webhook_tolerance(Duration::ZERO);
    lenient.handle_webhook(&body, &header).unwrap();
}

#[test]
fn verified_but_undecodable_body_is_malformed() {
    let stripe = offline_provider();
    let body = br#"{"id": "evt_1", "type": "customer.updated", "data": {"object": {"id": 7}}}"#;

    let err = stripe.handle_webhook(body, &signed(body)).unwrap_err();
    assert_eq!(err.stage(), IngestStage::Mapped);

    let body = b"[1, 2, 3]";
    let err = stripe.handle_webhook(body, &signed(body)).unwrap_err();
    assert_eq!(err.stage(), IngestStage::Parsed);
}

#[test]
fn unknown_event_type_passes_through() {
    let stripe = offline_provider();
    let body = event("evt_9", "payout.paid", json!({"id": "po_1", "object": "payout"}));

    let event = stripe.handle_webhook(&body, &signed(&body)).unwrap();
    match event.data {
        Some(WebhookData::Unrecognized(value)) => assert_eq!(value["id"], "po_1"),
        other => panic!("expected unrecognized, got {other:?}"),
    }
}

#[test]
fn processor_applies_stripe_deliveries() {
    let store = Arc::new(MemoryStore::new());
    let mut stripe = StripeProvider::new(store.clone());
    stripe
        .configure(&Credentials::with_api_key(API_KEY).webhook_secret(WEBHOOK_SECRET))
        .unwrap();

    let workspace_id = WorkspaceId::generate();
    let processor = WebhookProcessor::new(
        Arc::new(stripe),
        store.clone(),
        SyncContext::new(PROVIDER_NAME, workspace_id),
    );

    let body = event("evt_1", "customer.created", stripe_customer("cus_1"));
    let first = processor.process(&body, &signed(&body)).unwrap();
    assert!(!first.duplicate);
    let applied = first.applied.unwrap();
    assert_eq!(applied.entity_type, EntityType::Customers);
    assert_eq!(applied.action, UpsertAction::Created);
    assert_eq!(applied.version, 1);

    let again = processor.process(&body, &signed(&body)).unwrap();
    assert!(again.duplicate);
    assert_eq!(again.event.id, first.event.id);
    assert_eq!(again.applied.unwrap().version, 2);

    assert_eq!(store.count(EntityType::Customers).unwrap(), 1);
    let logged = store
        .get_webhook_event(PROVIDER_NAME, "evt_1")
        .unwrap()
        .unwrap();
    assert!(logged.signature_valid);

    let forged = processor.process(&body, "t=1,v1=00").unwrap_err();
    assert!(matches!(forged, WebhookError::InvalidSignature { .. }));
}
