//! Common test utilities for paysync-stripe integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use paysync_core::InitialSyncConfig;
use paysync_store::MemoryStore;
use paysync_stripe::StripeProvider;
use paysync_sync::{Credentials, PaymentProvider};

/// Webhook secret configured on test providers.
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// API key configured on test providers.
pub const API_KEY: &str = "sk_test_paysync";

/// A provider pointed at `server`, plus the store its syncs write to.
pub fn provider(server: &MockServer) -> (StripeProvider, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut stripe = StripeProvider::new(store.clone());
    stripe
        .configure(
            &Credentials::with_api_key(API_KEY)
                .webhook_secret(WEBHOOK_SECRET)
                .api_base(server.uri()),
        )
        .expect("configure");
    (stripe, store)
}

/// A provider that was never pointed at a server; fine for webhooks.
pub fn offline_provider() -> StripeProvider {
    let mut stripe = StripeProvider::new(Arc::new(MemoryStore::new()));
    stripe
        .configure(&Credentials::with_api_key(API_KEY).webhook_secret(WEBHOOK_SECRET))
        .expect("configure");
    stripe
}

/// Sync config with a 1ms retry delay.
pub fn fast_config(entity_types: &[&str]) -> InitialSyncConfig {
    InitialSyncConfig {
        entity_types: entity_types.iter().map(ToString::to_string).collect(),
        retry_delay: Duration::from_millis(1),
        ..InitialSyncConfig::default()
    }
}

/// A Stripe list body.
pub fn list(data: Vec<Value>, has_more: bool) -> Value {
    json!({
        "object": "list",
        "data": data,
        "has_more": has_more,
        "url": "/v1/list"
    })
}

/// A Stripe customer object.
pub fn stripe_customer(id: &str) -> Value {
    json!({
        "id": id,
        "object": "customer",
        "email": format!("{id}@example.com"),
        "name": "Test Customer",
        "metadata": {},
        "created": 1_700_000_000
    })
}

/// A Stripe product object.
pub fn stripe_product(id: &str) -> Value {
    json!({
        "id": id,
        "object": "product",
        "name": "Pro",
        "active": true,
        "metadata": {},
        "created": 1_700_000_000,
        "updated": 1_700_000_000
    })
}

/// A monthly Stripe price of `product`.
pub fn stripe_price(id: &str, product: &str) -> Value {
    json!({
        "id": id,
        "object": "price",
        "product": product,
        "active": true,
        "unit_amount": 2000,
        "currency": "usd",
        "type": "recurring",
        "recurring": {"interval": "month", "interval_count": 1},
        "metadata": {"term_length": "12"},
        "created": 1_700_000_000
    })
}

/// A Stripe error body.
pub fn stripe_error(error_type: &str, message: &str) -> Value {
    json!({
        "error": {
            "type": error_type,
            "message": message,
            "code": "resource_missing"
        }
    })
}

/// A webhook envelope around `object`.
pub fn event(id: &str, event_type: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": 1_700_000_000,
        "livemode": false,
        "data": {"object": object}
    }))
    .expect("serialize event")
}
