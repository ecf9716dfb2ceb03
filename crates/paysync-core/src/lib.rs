//! Canonical billing model for paysync.
//!
//! This crate provides the provider-independent types every other paysync crate
//! speaks:
//!
//! - **Identifiers**: `CustomerId`, `ProductId`, `PriceId`, `WorkspaceId`, `SyncEventId`, ...
//! - **Entities**: `Customer`, `Product`, `Price`, `Subscription`, `Invoice`, `Transaction`
//! - **Sync bookkeeping**: `ProviderSync`, `PaymentSyncStatus`
//! - **Webhooks**: `WebhookEvent`, `WebhookData`
//! - **Sessions**: `SyncSession`, `SyncEvent`, `InitialSyncConfig`
//! - **Pagination**: `ListParams`, `Page`
//!
//! # Amounts
//!
//! Every amount is an `i64` in the minor unit of its currency, exactly as the
//! provider reported it. Nothing in this crate converts or rounds amounts.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod customer;
pub mod entity;
pub mod error;
pub mod ids;
pub mod invoice;
pub mod pagination;
pub mod price;
pub mod product;
pub mod session;
pub mod subscription;
pub mod sync;
pub mod transaction;
pub mod webhook;

pub use customer::{Address, Customer, CustomerWorkspace, Shipping, TaxId};
pub use entity::{EntityType, SyncRecord};
pub use error::{BillingError, Result};
pub use ids::{
    CustomerId, IdError, InvoiceId, PriceId, ProductId, SubscriptionId, SyncEventId,
    SyncSessionId, TransactionId, WalletId, WebhookEventId, WorkspaceId,
};
pub use invoice::{Invoice, InvoiceLineItem, InvoiceStatus, TaxAmount};
pub use pagination::{CreatedRange, ListParams, Page, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use price::{IntervalType, Price, PriceTier, PriceType, TaxBehavior, TiersMode};
pub use product::Product;
pub use session::{
    InitialSyncConfig, SessionStatus, SessionType, SyncEvent, SyncEventType, SyncSession,
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
pub use subscription::{Subscription, SubscriptionItem, SubscriptionStatus};
pub use sync::{Metadata, PaymentSyncStatus, ProviderSync};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use webhook::{WebhookData, WebhookEvent};
