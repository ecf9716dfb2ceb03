//! The provider adapter contract.
//!
//! Every payment platform integration implements [`PaymentProvider`]. The
//! trait speaks canonical types only; provider-native objects never cross it.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use paysync_core::{
    Customer, InitialSyncConfig, Invoice, ListParams, Page, Price, Product, Subscription,
    Transaction, WebhookEvent, WorkspaceId,
};

use crate::error::{Result, SyncError, WebhookError};
use crate::orchestrator::SyncTask;

/// Credentials handed to [`PaymentProvider::configure`].
///
/// Which fields are required is up to the adapter.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Secret API key.
    pub api_key: Option<String>,

    /// Webhook signing secret.
    pub webhook_secret: Option<String>,

    /// API base URL override (tests, proxies).
    pub api_base: Option<String>,

    /// Adapter-specific options.
    pub options: HashMap<String, String>,
}

impl Credentials {
    /// Credentials holding only an API key.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Set the webhook secret.
    #[must_use]
    pub fn webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Set an adapter-specific option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("api_base", &self.api_base)
            .field("options", &self.options)
            .finish()
    }
}

/// A payment platform integration.
///
/// Client state lives in the adapter instance. `configure` may be called
/// again to replace it; every other operation fails with
/// `ProviderError::NotConfigured` until it has succeeded once.
///
/// `list_*` operations honor the cursor contract of [`Page::from_items`]:
/// `next_cursor` is set exactly when the page came back full.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name recorded on synced records (`stripe`).
    fn service_name(&self) -> &'static str;

    /// Install credentials.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if a required field is absent.
    fn configure(&mut self, credentials: &Credentials) -> Result<()>;

    /// Make a cheap authenticated read.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the credentials are rejected.
    async fn check_connection(&self) -> Result<()>;

    // =========================================================================
    // Customers
    // =========================================================================

    /// Create a customer at the provider.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn create_customer(&self, customer: &Customer) -> Result<Customer>;

    /// Fetch a customer.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the provider has no such customer.
    async fn get_customer(&self, external_id: &str) -> Result<Customer>;

    /// Update a customer identified by its external id.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn update_customer(&self, customer: &Customer) -> Result<Customer>;

    /// Delete a customer.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn delete_customer(&self, external_id: &str) -> Result<()>;

    /// List customers.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn list_customers(&self, params: &ListParams) -> Result<Page<Customer>>;

    // =========================================================================
    // Products
    // =========================================================================

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn create_product(&self, product: &Product) -> Result<Product>;

    /// Fetch a product.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the provider has no such product.
    async fn get_product(&self, external_id: &str) -> Result<Product>;

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn update_product(&self, product: &Product) -> Result<Product>;

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn delete_product(&self, external_id: &str) -> Result<()>;

    /// List products.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn list_products(&self, params: &ListParams) -> Result<Page<Product>>;

    // =========================================================================
    // Prices
    // =========================================================================

    /// Create a price for `price.external_product_id`.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn create_price(&self, price: &Price) -> Result<Price>;

    /// Fetch a price.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the provider has no such price.
    async fn get_price(&self, external_id: &str) -> Result<Price>;

    /// Update the mutable fields of a price.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn update_price(&self, price: &Price) -> Result<Price>;

    /// Delete (or archive, where the provider cannot delete) a price.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn delete_price(&self, external_id: &str) -> Result<()>;

    /// List prices.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn list_prices(&self, params: &ListParams) -> Result<Page<Price>>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Create a subscription.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn create_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    /// Fetch a subscription.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the provider has no such subscription.
    async fn get_subscription(&self, external_id: &str) -> Result<Subscription>;

    /// Update a subscription.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    /// Delete (or cancel) a subscription.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn delete_subscription(&self, external_id: &str) -> Result<()>;

    /// List subscriptions.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn list_subscriptions(&self, params: &ListParams) -> Result<Page<Subscription>>;

    // =========================================================================
    // Invoices
    // =========================================================================

    /// Create an invoice.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn create_invoice(&self, invoice: &Invoice) -> Result<Invoice>;

    /// Fetch an invoice.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the provider has no such invoice.
    async fn get_invoice(&self, external_id: &str) -> Result<Invoice>;

    /// Update an invoice.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn update_invoice(&self, invoice: &Invoice) -> Result<Invoice>;

    /// Delete an invoice.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn delete_invoice(&self, external_id: &str) -> Result<()>;

    /// List invoices.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn list_invoices(&self, params: &ListParams) -> Result<Page<Invoice>>;

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Create a transaction of `transaction.transaction_type`.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn create_transaction(&self, transaction: &Transaction) -> Result<Transaction>;

    /// Fetch a transaction. The external id prefix decides its kind.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the provider has no such object.
    async fn get_transaction(&self, external_id: &str) -> Result<Transaction>;

    /// Update a transaction.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn update_transaction(&self, transaction: &Transaction) -> Result<Transaction>;

    /// Delete (or cancel) a transaction.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn delete_transaction(&self, external_id: &str) -> Result<()>;

    /// List transactions of the kind named by `params.filters["type"]`.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    async fn list_transactions(&self, params: &ListParams) -> Result<Page<Transaction>>;

    // =========================================================================
    // Webhooks and sync
    // =========================================================================

    /// Verify, parse and map an inbound webhook.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidSignature` carrying the unverified event
    /// if the signature does not match, or `WebhookError::Malformed` if the
    /// verified body cannot be decoded or mapped.
    fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> std::result::Result<WebhookEvent, WebhookError>;

    /// Start a bulk initial sync of `workspace_id` on a background task.
    ///
    /// Returns as soon as the session is persisted and running.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    async fn start_initial_sync(
        &self,
        workspace_id: WorkspaceId,
        config: InitialSyncConfig,
    ) -> std::result::Result<SyncTask, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let creds = Credentials::with_api_key("sk_test_123")
            .webhook_secret("whsec_abc")
            .api_base("http://localhost:1234");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("sk_test_123"));
        assert!(!shown.contains("whsec_abc"));
        assert!(shown.contains("localhost:1234"));
    }

    #[test]
    fn builder_sets_fields() {
        let creds = Credentials::with_api_key("key").option("account", "acct_1");
        assert_eq!(creds.api_key.as_deref(), Some("key"));
        assert!(creds.webhook_secret.is_none());
        assert_eq!(creds.options.get("account").map(String::as_str), Some("acct_1"));
    }
}
