//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Uniqueness checks and version compare-and-swap run under a single writer
//! lock; reads go straight to the database.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use paysync_core::{
    Customer, CustomerId, CustomerWorkspace, EntityType, Invoice, InvoiceId, Price, PriceId,
    Product, ProductId, Subscription, SubscriptionId, SyncEvent, SyncSession, SyncSessionId,
    Transaction, TransactionId, WebhookEvent, WorkspaceId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::record::Record;
use crate::schema::{
    all_column_families, cf, Families, CUSTOMER_FAMILIES, INVOICE_FAMILIES, PRICE_FAMILIES,
    PRODUCT_FAMILIES, SUBSCRIPTION_FAMILIES, TRANSACTION_FAMILIES,
};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "Opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_raw(&self, family: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(family)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        family: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        self.get_raw(family, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Keys and values under `prefix`, in key order.
    fn scan_prefix(&self, family: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(family)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    // =========================================================================
    // Generic entity rows
    // =========================================================================

    fn get_row<T: Record>(&self, families: &Families, id: &uuid::Uuid) -> Result<Option<T>> {
        self.get_value(families.rows, &keys::row_key(id))
    }

    fn find_row<T: Record>(&self, families: &Families, external_key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(families.by_external, external_key)? {
            Some(row_key) => self.get_value(families.rows, &row_key),
            None => Ok(None),
        }
    }

    fn insert_row<T: Record>(&self, families: &Families, record: &T) -> Result<()> {
        let row_key = record.require_row_key()?;
        let external_key = record.require_external_key()?;
        let value = Self::serialize(record)?;

        let _guard = self.lock()?;

        if self.get_raw(families.rows, &row_key)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: T::NAME,
                key: record.display_id(),
            });
        }
        if self.get_raw(families.by_external, &external_key)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: T::NAME,
                key: record.external_id().to_string(),
            });
        }

        let cf_rows = self.cf(families.rows)?;
        let cf_index = self.cf(families.by_external)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_rows, &row_key, &value);
        batch.put_cf(&cf_index, &external_key, &row_key);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_row<T: Record>(
        &self,
        families: &Families,
        record: &T,
        expected_version: i64,
    ) -> Result<()> {
        let row_key = record.require_row_key()?;
        let external_key = record.require_external_key()?;
        let value = Self::serialize(record)?;

        let _guard = self.lock()?;

        let stored: T = self
            .get_value(families.rows, &row_key)?
            .ok_or_else(|| StoreError::NotFound {
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

        let cf_rows = self.cf(families.rows)?;
        let cf_index = self.cf(families.by_external)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_rows, &row_key, &value);

        let old_external_key = stored.require_external_key()?;
        if old_external_key != external_key {
            if self.get_raw(families.by_external, &external_key)?.is_some() {
                return Err(StoreError::Duplicate {
                    entity: T::NAME,
                    key: record.external_id().to_string(),
                });
            }
            batch.delete_cf(&cf_index, &old_external_key);
            batch.put_cf(&cf_index, &external_key, &row_key);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn count_rows(&self, family: &str) -> Result<usize> {
        let cf = self.cf(family)?;
        let mut count = 0;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| StoreError::Database(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Customers
    // =========================================================================

    fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        self.get_row(&CUSTOMER_FAMILIES, id.as_uuid())
    }

    fn find_customer(&self, provider: &str, external_id: &str) -> Result<Option<Customer>> {
        self.find_row(
            &CUSTOMER_FAMILIES,
            &keys::external_key(provider, None, external_id),
        )
    }

    fn insert_customer(&self, customer: &Customer) -> Result<()> {
        self.insert_row(&CUSTOMER_FAMILIES, customer)
    }

    fn update_customer(&self, customer: &Customer, expected_version: i64) -> Result<()> {
        self.update_row(&CUSTOMER_FAMILIES, customer, expected_version)
    }

    fn link_customer_workspace(&self, link: &CustomerWorkspace) -> Result<bool> {
        let key = keys::customer_workspace_key(link.customer_id.as_uuid(), &link.workspace_id);
        let value = Self::serialize(link)?;

        let _guard = self.lock()?;
        if self.get_raw(cf::CUSTOMER_WORKSPACES, &key)?.is_some() {
            return Ok(false);
        }

        let cf = self.cf(cf::CUSTOMER_WORKSPACES)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn customer_workspaces(&self, customer_id: &CustomerId) -> Result<Vec<WorkspaceId>> {
        let entries = self.scan_prefix(cf::CUSTOMER_WORKSPACES, customer_id.as_bytes())?;

        let mut links: Vec<CustomerWorkspace> = entries
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect::<Result<_>>()?;
        links.sort_by_key(|link| link.created_at);

        Ok(links.into_iter().map(|link| link.workspace_id).collect())
    }

    // =========================================================================
    // Products
    // =========================================================================

    fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        self.get_row(&PRODUCT_FAMILIES, id.as_uuid())
    }

    fn find_product(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Product>> {
        self.find_row(
            &PRODUCT_FAMILIES,
            &keys::external_key(provider, Some(workspace_id), external_id),
        )
    }

    fn insert_product(&self, product: &Product) -> Result<()> {
        self.insert_row(&PRODUCT_FAMILIES, product)
    }

    fn update_product(&self, product: &Product, expected_version: i64) -> Result<()> {
        self.update_row(&PRODUCT_FAMILIES, product, expected_version)
    }

    // =========================================================================
    // Prices
    // =========================================================================

    fn get_price(&self, id: &PriceId) -> Result<Option<Price>> {
        self.get_row(&PRICE_FAMILIES, id.as_uuid())
    }

    fn find_price(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Price>> {
        self.find_row(
            &PRICE_FAMILIES,
            &keys::external_key(provider, Some(workspace_id), external_id),
        )
    }

    fn insert_price(&self, price: &Price) -> Result<()> {
        self.insert_row(&PRICE_FAMILIES, price)
    }

    fn update_price(&self, price: &Price, expected_version: i64) -> Result<()> {
        self.update_row(&PRICE_FAMILIES, price, expected_version)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    fn get_subscription(&self, id: &SubscriptionId) -> Result<Option<Subscription>> {
        self.get_row(&SUBSCRIPTION_FAMILIES, id.as_uuid())
    }

    fn find_subscription(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Subscription>> {
        self.find_row(
            &SUBSCRIPTION_FAMILIES,
            &keys::external_key(provider, Some(workspace_id), external_id),
        )
    }

    fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.insert_row(&SUBSCRIPTION_FAMILIES, subscription)
    }

    fn update_subscription(
        &self,
        subscription: &Subscription,
        expected_version: i64,
    ) -> Result<()> {
        self.update_row(&SUBSCRIPTION_FAMILIES, subscription, expected_version)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    fn get_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>> {
        self.get_row(&INVOICE_FAMILIES, id.as_uuid())
    }

    fn find_invoice(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Invoice>> {
        self.find_row(
            &INVOICE_FAMILIES,
            &keys::external_key(provider, Some(workspace_id), external_id),
        )
    }

    fn insert_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.insert_row(&INVOICE_FAMILIES, invoice)
    }

    fn update_invoice(&self, invoice: &Invoice, expected_version: i64) -> Result<()> {
        self.update_row(&INVOICE_FAMILIES, invoice, expected_version)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    fn get_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.get_row(&TRANSACTION_FAMILIES, id.as_uuid())
    }

    fn find_transaction(
        &self,
        provider: &str,
        workspace_id: &WorkspaceId,
        external_id: &str,
    ) -> Result<Option<Transaction>> {
        self.find_row(
            &TRANSACTION_FAMILIES,
            &keys::external_key(provider, Some(workspace_id), external_id),
        )
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.insert_row(&TRANSACTION_FAMILIES, transaction)
    }

    fn update_transaction(&self, transaction: &Transaction, expected_version: i64) -> Result<()> {
        self.update_row(&TRANSACTION_FAMILIES, transaction, expected_version)
    }

    // =========================================================================
    // Counting
    // =========================================================================

    fn count(&self, entity_type: EntityType) -> Result<usize> {
        let family = match entity_type {
            EntityType::Customers => cf::CUSTOMERS,
            EntityType::Products => cf::PRODUCTS,
            EntityType::Prices => cf::PRICES,
            EntityType::Subscriptions => cf::SUBSCRIPTIONS,
            EntityType::Invoices => cf::INVOICES,
            EntityType::Transactions => cf::TRANSACTIONS,
        };
        self.count_rows(family)
    }

    // =========================================================================
    // Webhook Event Log
    // =========================================================================

    fn record_webhook_event(&self, event: &WebhookEvent) -> Result<bool> {
        let key = keys::webhook_event_key(&event.provider, &event.provider_event_id);
        let value = Self::serialize(event)?;

        let _guard = self.lock()?;
        if self.get_raw(cf::WEBHOOK_EVENTS, &key)?.is_some() {
            return Ok(false);
        }

        let cf = self.cf(cf::WEBHOOK_EVENTS)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn get_webhook_event(
        &self,
        provider: &str,
        provider_event_id: &str,
    ) -> Result<Option<WebhookEvent>> {
        self.get_value(
            cf::WEBHOOK_EVENTS,
            &keys::webhook_event_key(provider, provider_event_id),
        )
    }

    // =========================================================================
    // Sync Sessions
    // =========================================================================

    fn insert_sync_session(&self, session: &SyncSession) -> Result<()> {
        let key = keys::session_key(&session.id);
        let index_key = keys::workspace_session_key(&session.workspace_id, &session.id);
        let value = Self::serialize(session)?;

        let _guard = self.lock()?;
        if self.get_raw(cf::SYNC_SESSIONS, &key)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: "sync session",
                key: session.id.to_string(),
            });
        }

        let cf_sessions = self.cf(cf::SYNC_SESSIONS)?;
        let cf_by_workspace = self.cf(cf::SYNC_SESSIONS_BY_WORKSPACE)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_sessions, &key, &value);
        batch.put_cf(&cf_by_workspace, &index_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_sync_session(&self, session: &SyncSession) -> Result<()> {
        let key = keys::session_key(&session.id);
        let value = Self::serialize(session)?;

        let _guard = self.lock()?;
        if self.get_raw(cf::SYNC_SESSIONS, &key)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "sync session",
                id: session.id.to_string(),
            });
        }

        let cf = self.cf(cf::SYNC_SESSIONS)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_sync_session(&self, id: &SyncSessionId) -> Result<Option<SyncSession>> {
        self.get_value(cf::SYNC_SESSIONS, &keys::session_key(id))
    }

    fn list_sync_sessions(&self, workspace_id: &WorkspaceId) -> Result<Vec<SyncSession>> {
        let entries = self.scan_prefix(cf::SYNC_SESSIONS_BY_WORKSPACE, workspace_id.as_bytes())?;

        let mut sessions = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            let Some(bytes) = keys::trailing_id(&key) else {
                continue;
            };
            let session_id = SyncSessionId::from_uuid(uuid::Uuid::from_bytes(bytes));
            if let Some(session) = self.get_sync_session(&session_id)? {
                sessions.push(session);
            }
        }

        // Session ids are random; order by creation.
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    // =========================================================================
    // Sync Events
    // =========================================================================

    fn append_sync_event(&self, event: &SyncEvent) -> Result<()> {
        let key = keys::sync_event_key(&event.session_id, &event.id);
        let value = Self::serialize(event)?;

        let _guard = self.lock()?;
        if self.get_raw(cf::SYNC_EVENTS, &key)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: "sync event",
                key: event.id.to_string(),
            });
        }

        let cf = self.cf(cf::SYNC_EVENTS)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_sync_events(&self, session_id: &SyncSessionId) -> Result<Vec<SyncEvent>> {
        self.scan_prefix(cf::SYNC_EVENTS, session_id.as_bytes())?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }
}
