//! In-memory storage implementation.
//!
//! This module provides the `MemoryStore` implementation of the `Store` trait.
//! It enforces the same unique-key and version rules as the persistent
//! backend, which is what the reconciliation tests rely on.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use paysync_core::{
    Customer, CustomerId, CustomerWorkspace, EntityType, Invoice, InvoiceId, Price, PriceId,
    Product, ProductId, Subscription, SubscriptionId, SyncEvent, SyncSession, SyncSessionId,
    Transaction, TransactionId, WebhookEvent, WorkspaceId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::record::Record;
use crate::Store;

/// Rows of one entity kind plus their external-id index.
struct Table<T> {
    rows: HashMap<Vec<u8>, T>,
    by_external: HashMap<Vec<u8>, Vec<u8>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            by_external: HashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    fn get(&self, id: &uuid::Uuid) -> Option<T> {
        self.rows.get(&keys::row_key(id)).cloned()
    }

    fn find(&self, external_key: &[u8]) -> Option<T> {
        self.by_external
            .get(external_key)
            .and_then(|row_key| self.rows.get(row_key))
            .cloned()
    }

    fn insert(&mut self, record: &T) -> Result<()> {
        let row_key = record.require_row_key()?;
        let external_key = record.require_external_key()?;

        if self.rows.contains_key(&row_key) {
            return Err(StoreError::Duplicate {
                entity: T::NAME,
                key: record.display_id(),
            });
        }
        if self.by_external.contains_key(&external_key) {
            return Err(StoreError::Duplicate {
                entity: T::NAME,
                key: record.external_id().to_string(),
            });
        }

        self.by_external.insert(external_key, row_key.clone());
        self.rows.insert(row_key, record.clone());
        Ok(())
    }

    fn update(&mut self, record: &T, expected_version: i64) -> Result<()> {
        let row_key = record.require_row_key()?;
        let external_key = record.require_external_key()?;

        let stored = self.rows.get(&row_key).ok_or_else(|| StoreError::NotFound {
            entity: T::NAME,
            id: record.display_id(),
        })?;

        let actual = stored.sync().version;
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                entity: T::NAME,
                id: record.display_id(),
                expected: expected_version,
                actual,
            });
        }

        let old_external_key = stored.require_external_key()?;
        if old_external_key != external_key {
            if self.by_external.contains_key(&external_key) {
                return Err(StoreError::Duplicate {
                    entity: T::NAME,
                    key: record.external_id().to_string(),
                });
            }
            self.by_external.remove(&old_external_key);
            self.by_external.insert(external_key, row_key.clone());
        }

        self.rows.insert(row_key, record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct State {
    customers: Table<Customer>,
    products: Table<Product>,
    prices: Table<Price>,
    subscriptions: Table<Subscription>,
    invoices: Table<Invoice>,
    transactions: Table<Transaction>,
    customer_workspaces: HashMap<CustomerId, Vec<CustomerWorkspace>>,
    webhook_events: HashMap<Vec<u8>, WebhookEvent>,
    sessions: HashMap<SyncSessionId, SyncSession>,
    session_order: Vec<SyncSessionId>,
    sync_events: HashMap<SyncSessionId, Vec<SyncEvent>>,
}

/// In-memory storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    // =========================================================================
    // Customers
    // =========================================================================

    fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.read()?.customers.get(id.as_uuid()))
    }

    fn find_customer(&self, provider: &str, external_id: &str) -> Result<Option<Customer>> {
        let key = keys::external_key(provider, None, external_id);
        Ok(self.read()?.customers.find(&key))
    }

    fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.write()?.customers.insert(customer)
    }

    fn update_customer(&self, customer: &Customer, expected_version: i64) -> Result<()> {
        self.write()?.customers.update(customer, expected_version)
    }

    fn link_customer_workspace(&self, link: &CustomerWorkspace) -> Result<bool> {
        let mut state = self.write()?;
        let links = state.customer_workspaces.entry(link.customer_id).or_default();
        if links.iter().any(|l| l.workspace_id == link.workspace_id) {
            return Ok(false);
        }
        links.push(*link);
        Ok(true)
    }

    fn customer_workspaces(&self, customer_id: &CustomerId) -> Result<Vec<WorkspaceId>> {
        Ok(self
            .read()?
            .customer_workspaces
            .get(customer_id)
            .map(|links| links.iter().map(|l| l.workspace_id).collect())
            .unwrap_or_default())
    }

    // =========================================================================
    // Products
    // =========================================================================

    fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.read()?.products.get(id.as_uuid()))
    }

    fn find_product(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Product>> {
        let key = keys::external_key(provider, Some(workspace_id), external_id);
        Ok(self.read()?.products.find(&key))
    }

    fn insert_product(&self, product: &Product) -> Result<()> {
        self.write()?.products.insert(product)
    }

    fn update_product(&self, product: &Product, expected_version: i64) -> Result<()> {
        self.write()?.products.update(product, expected_version)
    }

    // =========================================================================
    // Prices
    // =========================================================================

    fn get_price(&self, id: &PriceId) -> Result<Option<Price>> {
        Ok(self.read()?.prices.get(id.as_uuid()))
    }

    fn find_price(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Price>> {
        let key = keys::external_key(provider, Some(workspace_id), external_id);
        Ok(self.read()?.prices.find(&key))
    }

    fn insert_price(&self, price: &Price) -> Result<()> {
        self.write()?.prices.insert(price)
    }

    fn update_price(&self, price: &Price, expected_version: i64) -> Result<()> {
        self.write()?.prices.update(price, expected_version)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>> {
        Ok(self.read()?.subscriptions.get(id.as_uuid()))
    }

    fn find_subscription(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Subscription>> {
        let key = keys::external_key(provider, Some(workspace_id), external_id);
        Ok(self.read()?.subscriptions.find(&key))
    }

    fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.write()?.subscriptions.insert(subscription)
    }

    fn update_subscription(
        &self,
        subscription: &Subscription,
        expected_version: i64,
    ) -> Result<()> {
        self.write()?.subscriptions.update(subscription, expected_version)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.read()?.invoices.get(id.as_uuid()))
    }

    fn find_invoice(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Invoice>> {
        let key = keys::external_key(provider, Some(workspace_id), external_id);
        Ok(self.read()?.invoices.find(&key))
    }

    fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.write()?.invoices.insert(invoice)
    }

    fn update_invoice(&self, invoice: &Invoice, expected_version: i64) -> Result<()> {
        self.write()?.invoices.update(invoice, expected_version)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.read()?.transactions.get(id.as_uuid()))
    }

    fn find_transaction(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Transaction>> {
        let key = keys::external_key(provider, Some(workspace_id), external_id);
        Ok(self.read()?.transactions.find(&key))
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.write()?.transactions.insert(transaction)
    }

    fn update_transaction(&self, transaction: &Transaction, expected_version: i64) -> Result<()> {
        self.write()?.transactions.update(transaction, expected_version)
    }

    // =========================================================================
    // Counting
    // =========================================================================

    fn count(&self, entity_type: EntityType) -> Result<usize> {
        let state = self.read()?;
        Ok(match entity_type {
            EntityType::Customers => state.customers.rows.len(),
            EntityType::Products => state.products.rows.len(),
            EntityType::Prices => state.prices.rows.len(),
            EntityType::Subscriptions => state.subscriptions.rows.len(),
            EntityType::Invoices => state.invoices.rows.len(),
            EntityType::Transactions => state.transactions.rows.len(),
        })
    }

    // =========================================================================
    // Webhook Event Log
    // =========================================================================

    fn record_webhook_event(&self, event: &WebhookEvent) -> Result<bool> {
        let key = keys::webhook_event_key(&event.provider, &event.provider_event_id);
        let mut state = self.write()?;
        if state.webhook_events.contains_key(&key) {
            return Ok(false);
        }
        state.webhook_events.insert(key, event.clone());
        Ok(true)
    }

    fn get_webhook_event(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<Option<WebhookEvent>> {
        let key = keys::webhook_event_key(provider, provider_event_id);
        Ok(self.read()?.webhook_events.get(&key).cloned())
    }

    // =========================================================================
    // Sync Sessions
    // =========================================================================

    fn insert_sync_session(&self, session: &SyncSession) -> Result<()> {
        let mut state = self.write()?;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Duplicate {
                entity: "sync session",
                key: session.id.to_string(),
            });
        }
        state.sessions.insert(session.id, session.clone());
        state.session_order.push(session.id);
        Ok(())
    }

    fn update_sync_session(&self, session: &SyncSession) -> Result<()> {
        let mut state = self.write()?;
        let stored = state
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "sync session",
                id: session.id.to_string(),
            })?;
        *stored = session.clone();
        Ok(())
    }

    fn get_sync_session(&self, id: &SyncSessionId) -> Result<Option<SyncSession>> {
        Ok(self.read()?.sessions.get(id).cloned())
    }

    fn list_sync_sessions(&self, workspace_id: &WorkspaceId) -> Result<Vec<SyncSession>> {
        let state = self.read()?;
        Ok(state
            .session_order
            .iter()
            .filter_map(|id| state.sessions.get(id))
            .filter(|s| s.workspace_id == *workspace_id)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Sync Events
    // =========================================================================

    fn append_sync_event(&self, event: &SyncEvent) -> Result<()> {
        let mut state = self.write()?;
        let events = state.sync_events.entry(event.session_id).or_default();
        if events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::Duplicate {
                entity: "sync event",
                key: event.id.to_string(),
            });
        }
        events.push(event.clone());
        Ok(())
    }

    fn list_sync_events(&self, session_id: &SyncSessionId) -> Result<Vec<SyncEvent>> {
        Ok(self
            .read()?
            .sync_events
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
