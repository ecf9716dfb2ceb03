//! Storage layer for paysync.
//!
//! This crate persists canonical billing records, the webhook event log, and
//! sync sessions with their audit events.
//!
//! # Backends
//!
//! - [`MemoryStore`]: in-process maps, used by tests and the binary when no
//!   persistent backend is compiled in.
//! - `RocksStore` (feature `rocksdb-backend`): `RocksDB` with one column family
//!   per record kind plus external-id index families, CBOR-encoded values.
//!
//! # Keys
//!
//! Every synced entity is looked up by `(provider, scope, external_id)`.
//! Customers, prices and transactions are indexed globally per provider;
//! products, subscriptions and invoices per workspace.
//!
//! # Concurrency
//!
//! Inserts reject a second row with the same external key
//! (`StoreError::Duplicate`), and updates are compare-and-swap on the
//! record's sync version (`StoreError::VersionConflict`). Callers resolve both
//! by re-reading and re-applying.
//!
//! # Example
//!
//! ```
//! use paysync_core::{Customer, CustomerId, ProviderSync};
//! use paysync_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let mut customer = Customer {
//!     id: Some(CustomerId::generate()),
//!     sync: ProviderSync::external("cus_123"),
//!     ..Customer::default()
//! };
//! customer.sync.mark_synced("stripe", chrono::Utc::now());
//! store.insert_customer(&customer).unwrap();
//!
//! let found = store.find_customer("stripe", "cus_123").unwrap();
//! assert_eq!(found.unwrap().id, customer.id);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod record;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::Record;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use paysync_core::{
    Customer, CustomerId, CustomerWorkspace, EntityType, Invoice, InvoiceId, Price, PriceId,
    Product, ProductId, Subscription, SubscriptionId, SyncEvent, SyncSession, SyncSessionId,
    Transaction, TransactionId, WebhookEvent, WorkspaceId,
};

/// The storage trait defining all database operations.
///
/// Implementations must be safe to share between the webhook path and any
/// number of running sync sessions.
pub trait Store: Send + Sync {
    // =========================================================================
    // Customers
    // =========================================================================

    /// Get a customer by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>>;

    /// Find a customer by provider and external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_customer(&self, provider: &str, external_id: &str) -> Result<Option<Customer>>;

    /// Insert a new customer. The record must carry an id and a provider.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or external key is taken.
    fn insert_customer(&self, customer: &Customer) -> Result<()>;

    /// Replace a customer if its stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` or `StoreError::VersionConflict`.
    fn update_customer(&self, customer: &Customer, expected_version: i64) -> Result<()>;

    /// Link a customer to a workspace. Returns `false` if the link existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn link_customer_workspace(&self, link: &CustomerWorkspace) -> Result<bool>;

    /// Workspaces a customer is linked to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn customer_workspaces(&self, customer_id: &CustomerId) -> Result<Vec<WorkspaceId>>;

    // =========================================================================
    // Products
    // =========================================================================

    /// Get a product by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Find a workspace's product by provider and external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_product(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Product>>;

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or external key is taken.
    fn insert_product(&self, product: &Product) -> Result<()>;

    /// Replace a product if its stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` or `StoreError::VersionConflict`.
    fn update_product(&self, product: &Product, expected_version: i64) -> Result<()>;

    // =========================================================================
    // Prices
    // =========================================================================

    /// Get a price by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_price(&self, id: &PriceId) -> Result<Option<Price>>;

    /// Find a price by provider and external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_price(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Price>>;

    /// Insert a new price.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or external key is taken.
    fn insert_price(&self, price: &Price) -> Result<()>;

    /// Replace a price if its stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` or `StoreError::VersionConflict`.
    fn update_price(&self, price: &Price, expected_version: i64) -> Result<()>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Get a subscription by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>>;

    /// Find a workspace's subscription by provider and external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_subscription(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Subscription>>;

    /// Insert a new subscription.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or external key is taken.
    fn insert_subscription(&self, subscription: &Subscription) -> Result<()>;

    /// Replace a subscription if its stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` or `StoreError::VersionConflict`.
    fn update_subscription(&self, subscription: &Subscription, expected_version: i64)
        -> Result<()>;

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Get an invoice by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>>;

    /// Find a workspace's invoice by provider and external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_invoice(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Invoice>>;

    /// Insert a new invoice.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or external key is taken.
    fn insert_invoice(&self, invoice: &Invoice) -> Result<()>;

    /// Replace an invoice if its stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` or `StoreError::VersionConflict`.
    fn update_invoice(&self, invoice: &Invoice, expected_version: i64) -> Result<()>;

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Get a transaction by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>>;

    /// Find a transaction by provider and external id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_transaction(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Transaction>>;

    /// Insert a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id or external key is taken.
    fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;

    /// Replace a transaction if its stored version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` or `StoreError::VersionConflict`.
    fn update_transaction(&self, transaction: &Transaction, expected_version: i64) -> Result<()>;

    // =========================================================================
    // Counting
    // =========================================================================

    /// Number of stored rows of one entity kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count(&self, entity_type: EntityType) -> Result<usize>;

    // =========================================================================
    // Webhook Event Log
    // =========================================================================

    /// Record a verified webhook event. Returns `false` if an event with the
    /// same `(provider, provider_event_id)` was already recorded; the first
    /// record is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn record_webhook_event(&self, event: &WebhookEvent) -> Result<bool>;

    /// Get a recorded webhook event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_webhook_event(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<Option<WebhookEvent>>;

    // =========================================================================
    // Sync Sessions
    // =========================================================================

    /// Insert a new session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id is taken.
    fn insert_sync_session(&self, session: &SyncSession) -> Result<()>;

    /// Overwrite a session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the session doesn't exist.
    fn update_sync_session(&self, session: &SyncSession) -> Result<()>;

    /// Get a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_sync_session(&self, id: &SyncSessionId) -> Result<Option<SyncSession>>;

    /// Sessions of a workspace, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sync_sessions(&self, workspace_id: &WorkspaceId) -> Result<Vec<SyncSession>>;

    // =========================================================================
    // Sync Events (append-only)
    // =========================================================================

    /// Append an audit event.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the event id was already written.
    fn append_sync_event(&self, event: &SyncEvent) -> Result<()>;

    /// Events of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_sync_events(&self, session_id: &SyncSessionId) -> Result<Vec<SyncEvent>>;
}
