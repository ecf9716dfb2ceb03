//! Common test utilities for paysync-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use paysync_core::{WalletId, WorkspaceId};
use paysync_service::{AppState, ServiceConfig};
use paysync_store::MemoryStore;

/// Webhook secret configured in test configs.
pub const WEBHOOK_SECRET: &str = "whsec_service_test";

/// A config pointed at `server` for `workspace_id`.
pub fn config(server: &MockServer, workspace_id: WorkspaceId) -> ServiceConfig {
    ServiceConfig {
        workspace_id: Some(workspace_id),
        stripe_api_key: Some("sk_test_service".into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        stripe_api_base: Some(server.uri()),
        retry_delay: Duration::from_millis(1),
        ..ServiceConfig::default()
    }
}

/// App state over a fresh in-memory store.
pub fn state(config: ServiceConfig) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), config).expect("app state");
    (state, store)
}

/// A config with a default wallet.
pub fn with_wallet(mut config: ServiceConfig, wallet_id: WalletId) -> ServiceConfig {
    config.wallet_id = Some(wallet_id);
    config
}

/// A Stripe list body.
pub fn list(data: Vec<Value>) -> Value {
    json!({"object": "list", "data": data, "has_more": false, "url": "/v1/list"})
}

/// A Stripe customer object.
pub fn stripe_customer(id: &str) -> Value {
    json!({
        "id": id,
        "object": "customer",
        "email": format!("{id}@example.com"),
        "metadata": {},
        "created": 1_700_000_000
    })
}

/// A Stripe product object.
pub fn stripe_product(id: &str) -> Value {
    json!({
        "id": id,
        "object": "product",
        "name": "Team",
        "active": true,
        "metadata": {},
        "created": 1_700_000_000
    })
}

/// A webhook envelope around `object`.
pub fn event(id: &str, event_type: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": 1_700_000_000,
        "data": {"object": object}
    }))
    .expect("serialize event")
}
