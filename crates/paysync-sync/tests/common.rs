//! Common test utilities for paysync-sync integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use paysync_core::{
    Customer, EntityType, InitialSyncConfig, IntervalType, Invoice, ListParams, Page, Price,
    PriceType, Product, ProviderSync, Subscription, SyncRecord, Transaction, TransactionType,
    WebhookData, WebhookEvent, WorkspaceId,
};
use paysync_store::{MemoryStore, Store};
use paysync_sync::{
    Credentials, IngestStage, PaymentProvider, ProviderError, Result, SyncError, SyncTask,
    WebhookError,
};

/// Signature the fake accepts.
pub const VALID_SIGNATURE: &str = "valid";

/// Provider name the fake reports.
pub const FAKE_PROVIDER: &str = "fake";

/// An in-memory provider serving fixed data sets.
#[derive(Default)]
pub struct FakeProvider {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub prices: Vec<Price>,
    pub subscriptions: Vec<Subscription>,
    pub invoices: Vec<Invoice>,
    pub transactions: Vec<Transaction>,
    /// Entity type whose list calls fail permanently.
    pub failing: Option<EntityType>,
    /// Delay before every list call answers.
    pub list_delay: Option<Duration>,
    /// Number of upcoming list calls that fail with a 503.
    pub transient_failures: AtomicU32,
    pub list_calls: Mutex<HashMap<EntityType, u32>>,
}

impl FakeProvider {
    /// List calls made for `kind`, failed attempts included.
    pub fn list_calls(&self, kind: EntityType) -> u32 {
        self.list_calls
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    async fn serve<T: SyncRecord + Clone>(
        &self,
        kind: EntityType,
        items: &[T],
        params: &ListParams,
    ) -> Result<Page<T>> {
        *self.list_calls.lock().unwrap().entry(kind).or_default() += 1;

        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing == Some(kind) {
            return Err(ProviderError::Api {
                status: 400,
                error_type: "invalid_request_error".into(),
                message: format!("cannot list {kind}"),
                code: None,
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Api {
                status: 503,
                error_type: "api_error".into(),
                message: "temporarily unavailable".into(),
                code: None,
            });
        }

        Ok(page_of(items, params))
    }
}

/// Slice `items` the way a cursor-paginated API would.
pub fn page_of<T: SyncRecord + Clone>(items: &[T], params: &ListParams) -> Page<T> {
    let position = |cursor: &str| items.iter().position(|i| i.external_id() == cursor);
    let limit = params.effective_limit();

    if let Some(marker) = params.ending_before.as_deref() {
        let end = position(marker).unwrap_or(0);
        let start = end.saturating_sub(limit as usize);
        return Page::from_items(items[start..end].to_vec(), limit);
    }

    let start = params
        .starting_after
        .as_deref()
        .and_then(position)
        .map_or(0, |pos| pos + 1);
    let slice: Vec<T> = items
        .iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();
    Page::from_items(slice, limit)
}

fn unsupported(operation: &str) -> ProviderError {
    ProviderError::Unsupported(format!("fake provider: {operation}"))
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    fn service_name(&self) -> &'static str {
        FAKE_PROVIDER
    }

    fn configure(&mut self, _credentials: &Credentials) -> Result<()> {
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn create_customer(&self, _customer: &Customer) -> Result<Customer> {
        Err(unsupported("create_customer"))
    }

    async fn get_customer(&self, external_id: &str) -> Result<Customer> {
        self.customers
            .iter()
            .find(|c| c.external_id() == external_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                entity: "customer",
                id: external_id.to_string(),
            })
    }

    async fn update_customer(&self, _customer: &Customer) -> Result<Customer> {
        Err(unsupported("update_customer"))
    }

    async fn delete_customer(&self, _external_id: &str) -> Result<()> {
        Err(unsupported("delete_customer"))
    }

    async fn list_customers(&self, params: &ListParams) -> Result<Page<Customer>> {
        self.serve(EntityType::Customers, &self.customers, params)
            .await
    }

    async fn create_product(&self, _product: &Product) -> Result<Product> {
        Err(unsupported("create_product"))
    }

    async fn get_product(&self, _external_id: &str) -> Result<Product> {
        Err(unsupported("get_product"))
    }

    async fn update_product(&self, _product: &Product) -> Result<Product> {
        Err(unsupported("update_product"))
    }

    async fn delete_product(&self, _external_id: &str) -> Result<()> {
        Err(unsupported("delete_product"))
    }

    async fn list_products(&self, params: &ListParams) -> Result<Page<Product>> {
        self.serve(EntityType::Products, &self.products, params).await
    }

    async fn create_price(&self, _price: &Price) -> Result<Price> {
        Err(unsupported("create_price"))
    }

    async fn get_price(&self, _external_id: &str) -> Result<Price> {
        Err(unsupported("get_price"))
    }

    async fn update_price(&self, _price: &Price) -> Result<Price> {
        Err(unsupported("update_price"))
    }

    async fn delete_price(&self, _external_id: &str) -> Result<()> {
        Err(unsupported("delete_price"))
    }

    async fn list_prices(&self, params: &ListParams) -> Result<Page<Price>> {
        self.serve(EntityType::Prices, &self.prices, params).await
    }

    async fn create_subscription(&self, _subscription: &Subscription) -> Result<Subscription> {
        Err(unsupported("create_subscription"))
    }

    async fn get_subscription(&self, _external_id: &str) -> Result<Subscription> {
        Err(unsupported("get_subscription"))
    }

    async fn update_subscription(&self, _subscription: &Subscription) -> Result<Subscription> {
        Err(unsupported("update_subscription"))
    }

    async fn delete_subscription(&self, _external_id: &str) -> Result<()> {
        Err(unsupported("delete_subscription"))
    }

    async fn list_subscriptions(&self, params: &ListParams) -> Result<Page<Subscription>> {
        self.serve(EntityType::Subscriptions, &self.subscriptions, params)
            .await
    }

    async fn create_invoice(&self, _invoice: &Invoice) -> Result<Invoice> {
        Err(unsupported("create_invoice"))
    }

    async fn get_invoice(&self, _external_id: &str) -> Result<Invoice> {
        Err(unsupported("get_invoice"))
    }

    async fn update_invoice(&self, _invoice: &Invoice) -> Result<Invoice> {
        Err(unsupported("update_invoice"))
    }

    async fn delete_invoice(&self, _external_id: &str) -> Result<()> {
        Err(unsupported("delete_invoice"))
    }

    async fn list_invoices(&self, params: &ListParams) -> Result<Page<Invoice>> {
        self.serve(EntityType::Invoices, &self.invoices, params).await
    }

    async fn create_transaction(&self, _transaction: &Transaction) -> Result<Transaction> {
        Err(unsupported("create_transaction"))
    }

    async fn get_transaction(&self, _external_id: &str) -> Result<Transaction> {
        Err(unsupported("get_transaction"))
    }

    async fn update_transaction(&self, _transaction: &Transaction) -> Result<Transaction> {
        Err(unsupported("update_transaction"))
    }

    async fn delete_transaction(&self, _external_id: &str) -> Result<()> {
        Err(unsupported("delete_transaction"))
    }

    async fn list_transactions(&self, params: &ListParams) -> Result<Page<Transaction>> {
        let kind = params
            .filters
            .get("type")
            .and_then(|t| TransactionType::parse(t))
            .unwrap_or_default();
        let of_kind: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.transaction_type == kind)
            .cloned()
            .collect();
        self.serve(EntityType::Transactions, &of_kind, params).await
    }

    fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> std::result::Result<WebhookEvent, WebhookError> {
        if signature != VALID_SIGNATURE {
            return Err(WebhookError::InvalidSignature {
                event: Box::new(WebhookEvent::unverified(FAKE_PROVIDER, payload)),
                reason: "signature mismatch".into(),
            });
        }

        let envelope: Envelope =
            serde_json::from_slice(payload).map_err(|e| WebhookError::Malformed {
                stage: IngestStage::Parsed,
                message: e.to_string(),
            })?;

        Ok(WebhookEvent {
            id: None,
            provider: FAKE_PROVIDER.into(),
            provider_event_id: envelope.id,
            event_type: envelope.event_type,
            raw_data: payload.to_vec(),
            signature_valid: true,
            data: Some(envelope.data),
            livemode: false,
            created_at: None,
            received_at: Utc::now(),
        })
    }

    async fn start_initial_sync(
        &self,
        _workspace_id: WorkspaceId,
        _config: InitialSyncConfig,
    ) -> std::result::Result<SyncTask, SyncError> {
        Err(SyncError::Provider(unsupported("start_initial_sync")))
    }
}

/// A fresh in-memory store.
pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Config with fast retries.
pub fn fast_config(entity_types: &[&str]) -> InitialSyncConfig {
    InitialSyncConfig {
        entity_types: entity_types.iter().map(ToString::to_string).collect(),
        retry_delay: Duration::from_millis(1),
        ..InitialSyncConfig::default()
    }
}

pub fn customer(external_id: &str) -> Customer {
    Customer {
        email: Some(format!("{external_id}@example.com")),
        sync: ProviderSync::external(external_id),
        ..Customer::default()
    }
}

pub fn customers(count: usize) -> Vec<Customer> {
    (0..count).map(|i| customer(&format!("cus_{i:04}"))).collect()
}

pub fn product(external_id: &str) -> Product {
    Product {
        name: format!("Product {external_id}"),
        active: true,
        sync: ProviderSync::external(external_id),
        ..Product::default()
    }
}

pub fn monthly_price(external_id: &str, product: &str) -> Price {
    Price {
        external_product_id: product.into(),
        active: true,
        amount: 2000,
        currency: "USD".into(),
        price_type: PriceType::Recurring,
        interval_type: Some(IntervalType::Month),
        interval_count: Some(1),
        term_length: Some(1),
        sync: ProviderSync::external(external_id),
        ..Price::default()
    }
}

pub fn transaction(external_id: &str, kind: TransactionType) -> Transaction {
    Transaction {
        transaction_type: kind,
        amount: 1500,
        currency: "USD".into(),
        sync: ProviderSync::external(external_id),
        ..Transaction::default()
    }
}

/// A webhook body the fake accepts.
pub fn webhook_body(event_id: &str, event_type: &str, data: &WebhookData) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "id": event_id,
        "type": event_type,
        "data": data,
    }))
    .unwrap()
}
