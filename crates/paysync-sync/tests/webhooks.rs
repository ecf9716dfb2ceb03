//! Webhook ingestion against the fake provider.

mod common;

use std::sync::{Arc, Barrier};

use paysync_core::{EntityType, WebhookData, WorkspaceId};
use paysync_store::{MemoryStore, Store};
use paysync_sync::{SyncContext, UpsertAction, WebhookError, WebhookProcessor};

use common::{
    customer, memory_store, monthly_price, product, webhook_body, FakeProvider, FAKE_PROVIDER,
    VALID_SIGNATURE,
};

fn processor(store: &Arc<MemoryStore>) -> WebhookProcessor {
    processor_for(store, WorkspaceId::generate())
}

fn processor_for(store: &Arc<MemoryStore>, workspace_id: WorkspaceId) -> WebhookProcessor {
    WebhookProcessor::new(
        Arc::new(FakeProvider::default()),
        store.clone(),
        SyncContext::new(FAKE_PROVIDER, workspace_id),
    )
}

#[test]
fn verified_delivery_is_logged_and_applied() {
    let store = memory_store();
    let body = webhook_body(
        "evt_1",
        "customer.created",
        &WebhookData::Customer(customer("cus_1")),
    );

    let outcome = processor(&store).process(&body, VALID_SIGNATURE).unwrap();

    assert!(!outcome.duplicate);
    assert!(outcome.event.signature_valid);
    assert!(outcome.event.id.is_some());
    let applied = outcome.applied.unwrap();
    assert_eq!(applied.entity_type, EntityType::Customers);
    assert_eq!(applied.action, UpsertAction::Created);
    assert_eq!(applied.version, 1);

    let logged = store
        .get_webhook_event(FAKE_PROVIDER, "evt_1")
        .unwrap()
        .unwrap();
    assert_eq!(logged.raw_data, body);
    assert!(store.find_customer(FAKE_PROVIDER, "cus_1").unwrap().is_some());
}

#[test]
fn invalid_signature_touches_nothing() {
    let store = memory_store();
    let body = webhook_body(
        "evt_1",
        "customer.created",
        &WebhookData::Customer(customer("cus_1")),
    );

    let err = processor(&store).process(&body, "forged").unwrap_err();

    assert!(matches!(err, WebhookError::InvalidSignature { .. }));
    let event = err.unverified_event().unwrap();
    assert!(!event.signature_valid);
    assert_eq!(event.raw_data, body);
    assert!(event.data.is_none());

    assert_eq!(store.count(EntityType::Customers).unwrap(), 0);
    assert!(store
        .get_webhook_event(FAKE_PROVIDER, "evt_1")
        .unwrap()
        .is_none());
}

#[test]
fn malformed_body_is_rejected() {
    let store = memory_store();
    let err = processor(&store)
        .process(b"not json", VALID_SIGNATURE)
        .unwrap_err();
    assert!(matches!(err, WebhookError::Malformed { .. }));
}

#[test]
fn concurrent_duplicate_deliveries_share_one_row() {
    let store = memory_store();
    let processor = processor(&store);
    let body = webhook_body(
        "evt_dup",
        "customer.updated",
        &WebhookData::Customer(customer("cus_1")),
    );
    let barrier = Barrier::new(2);

    let outcomes: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    processor.process(&body, VALID_SIGNATURE).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|o| o.duplicate).count(), 1);
    assert_eq!(outcomes[0].event.id, outcomes[1].event.id);

    assert_eq!(store.count(EntityType::Customers).unwrap(), 1);
    let stored = store.find_customer(FAKE_PROVIDER, "cus_1").unwrap().unwrap();
    assert_eq!(stored.sync.version, 2);
}

#[test]
fn redelivery_updates_the_same_row() {
    let store = memory_store();
    let processor = processor(&store);
    let body = webhook_body(
        "evt_1",
        "product.created",
        &WebhookData::Product(product("prod_1")),
    );

    let first = processor.process(&body, VALID_SIGNATURE).unwrap();
    let second = processor.process(&body, VALID_SIGNATURE).unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.applied.unwrap().action, UpsertAction::Updated);
    assert_eq!(store.count(EntityType::Products).unwrap(), 1);
}

#[test]
fn deletion_deactivates_product() {
    let store = memory_store();
    let workspace_id = WorkspaceId::generate();
    let processor = processor_for(&store, workspace_id);
    let data = WebhookData::Product(product("prod_1"));

    processor
        .process(&webhook_body("evt_1", "product.created", &data), VALID_SIGNATURE)
        .unwrap();
    let deleted = processor
        .process(&webhook_body("evt_2", "product.deleted", &data), VALID_SIGNATURE)
        .unwrap();

    assert_eq!(deleted.applied.unwrap().version, 2);
    let stored = store
        .find_product(FAKE_PROVIDER, &workspace_id, "prod_1")
        .unwrap()
        .unwrap();
    assert!(!stored.active);
    assert_eq!(store.count(EntityType::Products).unwrap(), 1);
}

#[test]
fn price_before_product_fails_reconciliation() {
    let store = memory_store();
    let body = webhook_body(
        "evt_1",
        "price.created",
        &WebhookData::Price(monthly_price("price_1", "prod_missing")),
    );

    let err = processor(&store).process(&body, VALID_SIGNATURE).unwrap_err();

    assert!(matches!(err, WebhookError::Reconcile(_)));
    assert!(err.to_string().contains("product not found"));
    assert_eq!(store.count(EntityType::Prices).unwrap(), 0);
    // The delivery itself was verified and stays logged.
    assert!(store
        .get_webhook_event(FAKE_PROVIDER, "evt_1")
        .unwrap()
        .is_some());
}

#[test]
fn unrecognized_payload_is_logged_only() {
    let store = memory_store();
    let body = webhook_body(
        "evt_1",
        "coupon.created",
        &WebhookData::Unrecognized(serde_json::json!({"id": "co_1"})),
    );

    let outcome = processor(&store).process(&body, VALID_SIGNATURE).unwrap();

    assert!(outcome.applied.is_none());
    assert!(store
        .get_webhook_event(FAKE_PROVIDER, "evt_1")
        .unwrap()
        .is_some());
}
