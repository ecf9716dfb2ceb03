//! Idempotent create-or-update of canonical records.
//!
//! Records are looked up by `(provider, external_id)`, scoped to the
//! workspace for products, subscriptions and invoices. A miss creates the row
//! at version 1; a hit applies the incoming mutable fields and bumps the
//! version by one. Both paths are compare-and-swap against the store, so two
//! concurrent applies of the same object end up as two versions of one row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use paysync_core::{
    Customer, CustomerId, CustomerWorkspace, EntityType, Invoice, InvoiceId, Price, PriceId,
    Product, ProductId, Subscription, SubscriptionId, SyncRecord, Transaction, TransactionId,
    WalletId, WebhookData, WorkspaceId,
};
use paysync_store::{Record, Store, StoreError};

use crate::error::ReconcileError;

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;

type StoreResult<T> = paysync_store::Result<T>;

/// Attempts made when concurrent writers keep winning the race.
pub const MAX_CONFLICT_ATTEMPTS: usize = 8;

/// Product metadata key naming the settlement wallet.
pub const WALLET_METADATA_KEY: &str = "wallet_id";

/// Who is reconciling, and for which workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Provider name recorded on every row.
    pub provider: String,
    /// Workspace that owns products, subscriptions and invoices.
    pub workspace_id: WorkspaceId,
    /// Wallet for products whose metadata names none.
    pub default_wallet_id: Option<WalletId>,
}

impl SyncContext {
    /// A context without a default wallet.
    #[must_use]
    pub fn new(provider: impl Into<String>, workspace_id: WorkspaceId) -> Self {
        Self {
            provider: provider.into(),
            workspace_id,
            default_wallet_id: None,
        }
    }

    /// Set the default wallet.
    #[must_use]
    pub fn with_default_wallet(mut self, wallet_id: WalletId) -> Self {
        self.default_wallet_id = Some(wallet_id);
        self
    }
}

/// What the upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// A new row was created.
    Created,
    /// An existing row was updated.
    Updated,
}

impl UpsertAction {
    /// The action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

/// A stored record and how it got there.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    /// The record as written.
    pub record: T,
    /// Whether it was created or updated.
    pub action: UpsertAction,
}

impl<T: SyncRecord> Reconciled<T> {
    /// Sync version after the write.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.record.sync().version
    }
}

/// Summary of one applied record, independent of its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Entity kind.
    pub entity_type: EntityType,
    /// External id.
    pub external_id: String,
    /// Internal id.
    pub internal_id: String,
    /// Created or updated.
    pub action: UpsertAction,
    /// Sync version after the write.
    pub version: i64,
}

impl<T: Record> From<&Reconciled<T>> for Applied {
    fn from(r: &Reconciled<T>) -> Self {
        Self {
            entity_type: T::ENTITY_TYPE,
            external_id: r.record.external_id().to_string(),
            internal_id: r.record.display_id(),
            action: r.action,
            version: r.record.sync().version,
        }
    }
}

/// Store plumbing the generic upsert needs per entity kind.
trait Upsert: Record {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>>;
    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()>;
    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()>;

    /// Assign identity and ownership to a row about to be created.
    fn prepare_insert(&mut self, ctx: &SyncContext, now: DateTime<Utc>);

    /// Copy the incoming mutable fields and resolved references.
    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>);
}

impl Upsert for Customer {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>> {
        store.find_customer(&ctx.provider, external_id)
    }

    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()> {
        store.insert_customer(record)
    }

    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()> {
        store.update_customer(record, expected_version)
    }

    fn prepare_insert(&mut self, _ctx: &SyncContext, now: DateTime<Utc>) {
        self.id = Some(CustomerId::generate());
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>) {
        self.apply(incoming);
        self.updated_at = Some(now);
    }
}

impl Upsert for Product {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>> {
        store.find_product(&ctx.provider, &ctx.workspace_id, external_id)
    }

    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()> {
        store.insert_product(record)
    }

    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()> {
        store.update_product(record, expected_version)
    }

    fn prepare_insert(&mut self, ctx: &SyncContext, now: DateTime<Utc>) {
        self.id = Some(ProductId::generate());
        self.workspace_id = Some(ctx.workspace_id);
        self.wallet_id = self
            .metadata
            .get(WALLET_METADATA_KEY)
            .and_then(|w| w.parse().ok())
            .or(ctx.default_wallet_id);
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>) {
        self.apply(incoming);
        self.updated_at = Some(now);
    }
}

impl Upsert for Price {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>> {
        store.find_price(&ctx.provider, &ctx.workspace_id, external_id)
    }

    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()> {
        store.insert_price(record)
    }

    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()> {
        store.update_price(record, expected_version)
    }

    fn prepare_insert(&mut self, ctx: &SyncContext, now: DateTime<Utc>) {
        self.id = Some(PriceId::generate());
        self.workspace_id = Some(ctx.workspace_id);
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>) {
        self.apply(incoming);
        self.product_id = incoming.product_id;
        self.updated_at = Some(now);
    }
}

impl Upsert for Subscription {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>> {
        store.find_subscription(&ctx.provider, &ctx.workspace_id, external_id)
    }

    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()> {
        store.insert_subscription(record)
    }

    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()> {
        store.update_subscription(record, expected_version)
    }

    fn prepare_insert(&mut self, ctx: &SyncContext, now: DateTime<Utc>) {
        self.id = Some(SubscriptionId::generate());
        self.workspace_id = Some(ctx.workspace_id);
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>) {
        self.apply(incoming);
        self.customer_id = incoming.customer_id;
        self.updated_at = Some(now);
    }
}

impl Upsert for Invoice {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>> {
        store.find_invoice(&ctx.provider, &ctx.workspace_id, external_id)
    }

    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()> {
        store.insert_invoice(record)
    }

    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()> {
        store.update_invoice(record, expected_version)
    }

    fn prepare_insert(&mut self, ctx: &SyncContext, now: DateTime<Utc>) {
        self.id = Some(InvoiceId::generate());
        self.workspace_id = Some(ctx.workspace_id);
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>) {
        self.apply(incoming);
        self.customer_id = incoming.customer_id;
        self.subscription_id = incoming.subscription_id;
        self.external_subscription_id
            .clone_from(&incoming.external_subscription_id);
        self.updated_at = Some(now);
    }
}

impl Upsert for Transaction {
    fn find(store: &dyn Store, ctx: &SyncContext, external_id: &str) -> StoreResult<Option<Self>> {
        store.find_transaction(&ctx.provider, &ctx.workspace_id, external_id)
    }

    fn insert(store: &dyn Store, record: &Self) -> StoreResult<()> {
        store.insert_transaction(record)
    }

    fn update(store: &dyn Store, record: &Self, expected_version: i64) -> StoreResult<()> {
        store.update_transaction(record, expected_version)
    }

    fn prepare_insert(&mut self, ctx: &SyncContext, now: DateTime<Utc>) {
        self.id = Some(TransactionId::generate());
        self.workspace_id = Some(ctx.workspace_id);
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    fn merge(&mut self, incoming: &Self, now: DateTime<Utc>) {
        self.apply(incoming);
        if incoming.customer_id.is_some() {
            self.customer_id = incoming.customer_id;
        }
        self.updated_at = Some(now);
    }
}

/// The reconciliation layer.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn Store>,
    context: SyncContext,
}

impl Reconciler {
    /// Create a reconciler writing to `store` on behalf of `context`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, context: SyncContext) -> Self {
        Self { store, context }
    }

    /// The context records are written under.
    #[must_use]
    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Upsert a customer and link it to the workspace.
    ///
    /// # Errors
    ///
    /// Returns a store error, or `MissingExternalId`.
    pub fn reconcile_customer(&self, customer: &Customer) -> Result<Reconciled<Customer>> {
        let reconciled = self.upsert(customer.clone())?;
        if let Some(customer_id) = reconciled.record.id {
            let link = CustomerWorkspace {
                customer_id,
                workspace_id: self.context.workspace_id,
                created_at: Utc::now(),
            };
            if self.store.link_customer_workspace(&link)? {
                tracing::debug!(
                    customer_id = %customer_id,
                    workspace_id = %self.context.workspace_id,
                    "Linked customer to workspace"
                );
            }
        }
        Ok(reconciled)
    }

    /// Upsert a product into the context's workspace.
    ///
    /// # Errors
    ///
    /// Returns a store error, or `MissingExternalId`.
    pub fn reconcile_product(&self, product: &Product) -> Result<Reconciled<Product>> {
        self.upsert(product.clone())
    }

    /// Upsert a price. Its product must already be synced.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` ("product not found") without writing
    /// anything if the product is unknown, `Invalid` if the price breaks the
    /// recurring/one-time rules, or a store error.
    pub fn reconcile_price(&self, price: &Price) -> Result<Reconciled<Price>> {
        let mut price = price.clone();
        let product = self
            .store
            .find_product(
                &self.context.provider,
                &self.context.workspace_id,
                &price.external_product_id,
            )?
            .ok_or_else(|| ReconcileError::MissingDependency {
                entity: "product",
                external_id: price.external_product_id.clone(),
            })?;
        price.product_id = product.id;
        price.validate()?;
        self.upsert(price)
    }

    /// Upsert a subscription. Its customer and every item's price must
    /// already be synced.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency`, `Invalid`, or a store error.
    pub fn reconcile_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Reconciled<Subscription>> {
        let mut subscription = subscription.clone();
        subscription.customer_id =
            Some(self.require_customer(&subscription.external_customer_id)?);

        for item in &mut subscription.items {
            let price = self
                .store
                .find_price(
                    &self.context.provider,
                    &self.context.workspace_id,
                    &item.external_price_id,
                )?
                .ok_or_else(|| ReconcileError::MissingDependency {
                    entity: "price",
                    external_id: item.external_price_id.clone(),
                })?;
            item.price_id = price.id;
        }

        subscription.validate()?;
        self.upsert(subscription)
    }

    /// Upsert an invoice. Its customer must already be synced; the
    /// subscription is linked when known.
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` or a store error.
    pub fn reconcile_invoice(&self, invoice: &Invoice) -> Result<Reconciled<Invoice>> {
        let mut invoice = invoice.clone();
        invoice.customer_id = Some(self.require_customer(&invoice.external_customer_id)?);

        invoice.subscription_id = match invoice.external_subscription_id.as_deref() {
            Some(external_id) if !external_id.is_empty() => self
                .store
                .find_subscription(&self.context.provider, &self.context.workspace_id, external_id)?
                .and_then(|s| s.id),
            _ => None,
        };

        self.upsert(invoice)
    }

    /// Upsert a transaction, linking its customer when known.
    ///
    /// # Errors
    ///
    /// Returns a store error, or `MissingExternalId`.
    pub fn reconcile_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Reconciled<Transaction>> {
        let mut transaction = transaction.clone();
        transaction.customer_id = match transaction.external_customer_id.as_deref() {
            Some(external_id) if !external_id.is_empty() => self
                .store
                .find_customer(&self.context.provider, external_id)?
                .and_then(|c| c.id),
            _ => None,
        };
        self.upsert(transaction)
    }

    /// Apply a webhook payload. Unrecognized payloads apply nothing.
    ///
    /// A deletion event deactivates products and prices; other kinds are
    /// upserted as delivered.
    ///
    /// # Errors
    ///
    /// Returns the error of the matching `reconcile_*` call.
    pub fn reconcile_webhook_data(
        &self,
        data: &WebhookData,
        deletion: bool,
    ) -> Result<Option<Applied>> {
        let applied = match data {
            WebhookData::Customer(c) => Applied::from(&self.reconcile_customer(c)?),
            WebhookData::Product(p) => {
                let mut p = p.clone();
                if deletion {
                    p.active = false;
                }
                Applied::from(&self.reconcile_product(&p)?)
            }
            WebhookData::Price(p) => {
                let mut p = p.clone();
                if deletion {
                    p.active = false;
                }
                Applied::from(&self.reconcile_price(&p)?)
            }
            WebhookData::Subscription(s) => Applied::from(&self.reconcile_subscription(s)?),
            WebhookData::Invoice(i) => Applied::from(&self.reconcile_invoice(i)?),
            WebhookData::Transaction(t) => Applied::from(&self.reconcile_transaction(t)?),
            WebhookData::Unrecognized(_) => return Ok(None),
        };
        Ok(Some(applied))
    }

    fn require_customer(&self, external_id: &str) -> Result<CustomerId> {
        self.store
            .find_customer(&self.context.provider, external_id)?
            .and_then(|c| c.id)
            .ok_or_else(|| ReconcileError::MissingDependency {
                entity: "customer",
                external_id: external_id.to_string(),
            })
    }

    fn upsert<T: Upsert>(&self, incoming: T) -> Result<Reconciled<T>> {
        let external_id = incoming.external_id().to_string();
        if external_id.is_empty() {
            return Err(ReconcileError::MissingExternalId(T::NAME));
        }

        let store = self.store.as_ref();
        let provider = self.context.provider.as_str();

        for attempt in 1..=MAX_CONFLICT_ATTEMPTS {
            let now = Utc::now();
            match T::find(store, &self.context, &external_id)? {
                None => {
                    let mut record = incoming.clone();
                    record.prepare_insert(&self.context, now);
                    record.sync_mut().version = 0;
                    record.sync_mut().mark_synced(provider, now);

                    match T::insert(store, &record) {
                        Ok(()) => {
                            return Ok(Reconciled {
                                record,
                                action: UpsertAction::Created,
                            })
                        }
                        Err(e) if e.is_duplicate() => {
                            tracing::debug!(
                                entity = T::NAME,
                                external_id = %external_id,
                                attempt,
                                "Concurrent create, falling back to update"
                            );
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Some(mut existing) => {
                    let expected = existing.sync().version;
                    existing.merge(&incoming, now);
                    existing.sync_mut().mark_synced(provider, now);

                    match T::update(store, &existing, expected) {
                        Ok(()) => {
                            return Ok(Reconciled {
                                record: existing,
                                action: UpsertAction::Updated,
                            })
                        }
                        Err(StoreError::VersionConflict { actual, .. }) => {
                            tracing::debug!(
                                entity = T::NAME,
                                external_id = %external_id,
                                expected,
                                actual,
                                attempt,
                                "Version moved, re-applying"
                            );
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        Err(ReconcileError::Contended {
            entity: T::NAME,
            external_id,
            attempts: MAX_CONFLICT_ATTEMPTS,
        })
    }
}
