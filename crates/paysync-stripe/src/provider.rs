//! [`PaymentProvider`] implementation for Stripe.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paysync_core::{
    Customer, InitialSyncConfig, Invoice, ListParams, Page, Price, Product, Subscription,
    SyncRecord, Transaction, TransactionType, WalletId, WebhookEvent, WorkspaceId,
};
use paysync_store::Store;
use paysync_sync::{
    Credentials, PaymentProvider, ProviderError, Result, SyncError, SyncOrchestrator, SyncTask,
    WebhookError,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::client::{not_found, StripeClient};
use crate::mapping::{customer, invoice, price, product, subscription, transaction};
use crate::params::{expand, FormParams};
use crate::types::{self, DeletedObject, StripeList};
use crate::webhook::{self, DEFAULT_TOLERANCE, PROVIDER_NAME};

/// Option key overriding the webhook timestamp tolerance, in seconds.
pub const WEBHOOK_TOLERANCE_OPTION: &str = "webhook_tolerance_seconds";

/// The Stripe adapter.
///
/// Cloning is cheap; clones share the HTTP connection pool and the store.
#[derive(Clone)]
pub struct StripeProvider {
    client: Option<StripeClient>,
    webhook_secret: Option<String>,
    webhook_tolerance: Duration,
    store: Arc<dyn Store>,
    default_wallet_id: Option<WalletId>,
}

impl fmt::Debug for StripeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeProvider")
            .field("client", &self.client)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("webhook_tolerance", &self.webhook_tolerance)
            .field("default_wallet_id", &self.default_wallet_id)
            .finish_non_exhaustive()
    }
}

impl StripeProvider {
    /// An unconfigured adapter whose initial syncs write to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            client: None,
            webhook_secret: None,
            webhook_tolerance: DEFAULT_TOLERANCE,
            store,
            default_wallet_id: None,
        }
    }

    /// Wallet given to synced products whose metadata names none.
    #[must_use]
    pub fn with_default_wallet(mut self, wallet_id: WalletId) -> Self {
        self.default_wallet_id = Some(wallet_id);
        self
    }

    /// Webhook timestamp tolerance; zero disables the check.
    #[must_use]
    pub fn with_webhook_tolerance(mut self, tolerance: Duration) -> Self {
        self.webhook_tolerance = tolerance;
        self
    }

    /// Whether `configure` has succeeded.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&StripeClient> {
        self.client.as_ref().ok_or(ProviderError::NotConfigured)
    }

    async fn list_page<S, C>(
        &self,
        path: &str,
        params: &ListParams,
        expansions: &[&str],
        map: fn(Option<&S>) -> C,
    ) -> Result<Page<C>>
    where
        S: DeserializeOwned + Send,
        C: SyncRecord + Send,
    {
        let mut query = FormParams::list(params);
        query.expand_list(expansions);

        let list: StripeList<S> = self.client()?.get(path, &query).await?;
        debug!(path, count = list.data.len(), has_more = list.has_more, "Stripe list page");

        let items = list.data.iter().map(|item| map(Some(item))).collect();
        Ok(Page::from_items(items, params.effective_limit()))
    }

    async fn post_transaction(
        &self,
        kind: TransactionType,
        path: &str,
        form: &FormParams,
    ) -> Result<Transaction> {
        let client = self.client()?;
        Ok(match kind {
            TransactionType::PaymentIntent => {
                let intent: types::PaymentIntent = client.post(path, form).await?;
                transaction::from_payment_intent(Some(&intent))
            }
            TransactionType::Charge => {
                let charge: types::Charge = client.post(path, form).await?;
                transaction::from_charge(Some(&charge))
            }
            TransactionType::Refund => {
                let refund: types::Refund = client.post(path, form).await?;
                transaction::from_refund(Some(&refund))
            }
        })
    }
}

/// The external id of a record being updated.
fn external_id<'a>(entity: &str, record: &'a impl SyncRecord) -> Result<&'a str> {
    let id = record.external_id();
    if id.is_empty() {
        return Err(ProviderError::InvalidInput(format!(
            "{entity} has no external id"
        )));
    }
    Ok(id)
}

fn transaction_type_of(id: &str) -> Result<TransactionType> {
    transaction::type_of_id(id)
        .ok_or_else(|| ProviderError::InvalidInput(format!("unrecognized transaction id {id}")))
}

fn expanded(fields: &[&str]) -> FormParams {
    let mut form = FormParams::new();
    form.expand(fields);
    form
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn service_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn configure(&mut self, credentials: &Credentials) -> Result<()> {
        let api_key = credentials
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::Configuration("api_key is required".into()))?;

        let tolerance = match credentials.options.get(WEBHOOK_TOLERANCE_OPTION) {
            Some(secs) => secs.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ProviderError::Configuration(format!(
                    "{WEBHOOK_TOLERANCE_OPTION} must be a whole number of seconds"
                ))
            })?,
            None => DEFAULT_TOLERANCE,
        };

        let client = StripeClient::new(api_key, credentials.api_base.clone())?;
        info!(base_url = client.base_url(), "Stripe adapter configured");

        self.client = Some(client);
        self.webhook_secret = credentials
            .webhook_secret
            .clone()
            .filter(|s| !s.is_empty());
        self.webhook_tolerance = tolerance;
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        let _: serde_json::Value = self.client()?.get("/balance", &FormParams::new()).await?;
        debug!("Stripe connection ok");
        Ok(())
    }

    // =========================================================================
    // Customers
    // =========================================================================

    async fn create_customer(&self, record: &Customer) -> Result<Customer> {
        let mut form = customer::to_params(record);
        form.expand(expand::CUSTOMER);
        let created: types::Customer = self.client()?.post("/customers", &form).await?;
        Ok(customer::to_canonical(Some(&created)))
    }

    async fn get_customer(&self, external_id: &str) -> Result<Customer> {
        let path = format!("/customers/{external_id}");
        let found: types::Customer = self
            .client()?
            .get(&path, &expanded(expand::CUSTOMER))
            .await
            .map_err(not_found("customer", external_id))?;
        Ok(customer::to_canonical(Some(&found)))
    }

    async fn update_customer(&self, record: &Customer) -> Result<Customer> {
        let id = external_id("customer", record)?;
        let mut form = customer::to_params(record);
        form.expand(expand::CUSTOMER);
        let updated: types::Customer = self
            .client()?
            .post(&format!("/customers/{id}"), &form)
            .await
            .map_err(not_found("customer", id))?;
        Ok(customer::to_canonical(Some(&updated)))
    }

    async fn delete_customer(&self, external_id: &str) -> Result<()> {
        let _: DeletedObject = self
            .client()?
            .delete(&format!("/customers/{external_id}"))
            .await
            .map_err(not_found("customer", external_id))?;
        Ok(())
    }

    async fn list_customers(&self, params: &ListParams) -> Result<Page<Customer>> {
        self.list_page("/customers", params, expand::CUSTOMER, customer::to_canonical)
            .await
    }

    // =========================================================================
    // Products
    // =========================================================================

    async fn create_product(&self, record: &Product) -> Result<Product> {
        let created: types::Product = self
            .client()?
            .post("/products", &product::to_params(record))
            .await?;
        Ok(product::to_canonical(Some(&created)))
    }

    async fn get_product(&self, external_id: &str) -> Result<Product> {
        let found: types::Product = self
            .client()?
            .get(&format!("/products/{external_id}"), &expanded(expand::PRODUCT))
            .await
            .map_err(not_found("product", external_id))?;
        Ok(product::to_canonical(Some(&found)))
    }

    async fn update_product(&self, record: &Product) -> Result<Product> {
        let id = external_id("product", record)?;
        let updated: types::Product = self
            .client()?
            .post(&format!("/products/{id}"), &product::to_params(record))
            .await
            .map_err(not_found("product", id))?;
        Ok(product::to_canonical(Some(&updated)))
    }

    async fn delete_product(&self, external_id: &str) -> Result<()> {
        let _: DeletedObject = self
            .client()?
            .delete(&format!("/products/{external_id}"))
            .await
            .map_err(not_found("product", external_id))?;
        Ok(())
    }

    async fn list_products(&self, params: &ListParams) -> Result<Page<Product>> {
        self.list_page("/products", params, expand::PRODUCT, product::to_canonical)
            .await
    }

    // =========================================================================
    // Prices
    // =========================================================================

    async fn create_price(&self, record: &Price) -> Result<Price> {
        if record.external_product_id.is_empty() {
            return Err(ProviderError::InvalidInput("price has no product".into()));
        }
        let mut form = price::to_params(record);
        form.expand(expand::PRICE);
        let created: types::Price = self.client()?.post("/prices", &form).await?;
        Ok(price::to_canonical(Some(&created)))
    }

    async fn get_price(&self, external_id: &str) -> Result<Price> {
        let found: types::Price = self
            .client()?
            .get(&format!("/prices/{external_id}"), &expanded(expand::PRICE))
            .await
            .map_err(not_found("price", external_id))?;
        Ok(price::to_canonical(Some(&found)))
    }

    async fn update_price(&self, record: &Price) -> Result<Price> {
        let id = external_id("price", record)?;
        let mut form = price::to_update_params(record);
        form.expand(expand::PRICE);
        let updated: types::Price = self
            .client()?
            .post(&format!("/prices/{id}"), &form)
            .await
            .map_err(not_found("price", id))?;
        Ok(price::to_canonical(Some(&updated)))
    }

    /// Stripe cannot delete prices; the price is archived instead.
    async fn delete_price(&self, external_id: &str) -> Result<()> {
        let mut form = FormParams::new();
        form.push("active", false);
        let _: types::Price = self
            .client()?
            .post(&format!("/prices/{external_id}"), &form)
            .await
            .map_err(not_found("price", external_id))?;
        Ok(())
    }

    async fn list_prices(&self, params: &ListParams) -> Result<Page<Price>> {
        self.list_page("/prices", params, expand::PRICE, price::to_canonical)
            .await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    async fn create_subscription(&self, record: &Subscription) -> Result<Subscription> {
        record.validate().map_err(|e| ProviderError::InvalidInput(e.to_string()))?;
        let mut form = subscription::to_params(record);
        form.expand(expand::SUBSCRIPTION);
        let created: types::Subscription = self.client()?.post("/subscriptions", &form).await?;
        Ok(subscription::to_canonical(Some(&created)))
    }

    async fn get_subscription(&self, external_id: &str) -> Result<Subscription> {
        let found: types::Subscription = self
            .client()?
            .get(
                &format!("/subscriptions/{external_id}"),
                &expanded(expand::SUBSCRIPTION),
            )
            .await
            .map_err(not_found("subscription", external_id))?;
        Ok(subscription::to_canonical(Some(&found)))
    }

    async fn update_subscription(&self, record: &Subscription) -> Result<Subscription> {
        let id = external_id("subscription", record)?;
        let mut form = subscription::to_update_params(record);
        form.expand(expand::SUBSCRIPTION);
        let updated: types::Subscription = self
            .client()?
            .post(&format!("/subscriptions/{id}"), &form)
            .await
            .map_err(not_found("subscription", id))?;
        Ok(subscription::to_canonical(Some(&updated)))
    }

    /// Cancels the subscription immediately.
    async fn delete_subscription(&self, external_id: &str) -> Result<()> {
        let _: types::Subscription = self
            .client()?
            .delete(&format!("/subscriptions/{external_id}"))
            .await
            .map_err(not_found("subscription", external_id))?;
        Ok(())
    }

    async fn list_subscriptions(&self, params: &ListParams) -> Result<Page<Subscription>> {
        // Stripe hides canceled subscriptions unless asked.
        let params = if params.filters.contains_key("status") {
            params.clone()
        } else {
            params.clone().filter("status", "all")
        };
        self.list_page(
            "/subscriptions",
            &params,
            expand::SUBSCRIPTION,
            subscription::to_canonical,
        )
        .await
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    async fn create_invoice(&self, record: &Invoice) -> Result<Invoice> {
        if record.external_customer_id.is_empty() {
            return Err(ProviderError::InvalidInput("invoice has no customer".into()));
        }
        let mut form = invoice::to_params(record);
        form.expand(expand::INVOICE);
        let created: types::Invoice = self.client()?.post("/invoices", &form).await?;
        Ok(invoice::to_canonical(Some(&created)))
    }

    async fn get_invoice(&self, external_id: &str) -> Result<Invoice> {
        let found: types::Invoice = self
            .client()?
            .get(&format!("/invoices/{external_id}"), &expanded(expand::INVOICE))
            .await
            .map_err(not_found("invoice", external_id))?;
        Ok(invoice::to_canonical(Some(&found)))
    }

    async fn update_invoice(&self, record: &Invoice) -> Result<Invoice> {
        let id = external_id("invoice", record)?;
        let mut form = invoice::to_update_params(record);
        form.expand(expand::INVOICE);
        let updated: types::Invoice = self
            .client()?
            .post(&format!("/invoices/{id}"), &form)
            .await
            .map_err(not_found("invoice", id))?;
        Ok(invoice::to_canonical(Some(&updated)))
    }

    /// Only draft invoices can be deleted; Stripe rejects the rest.
    async fn delete_invoice(&self, external_id: &str) -> Result<()> {
        let _: DeletedObject = self
            .client()?
            .delete(&format!("/invoices/{external_id}"))
            .await
            .map_err(not_found("invoice", external_id))?;
        Ok(())
    }

    async fn list_invoices(&self, params: &ListParams) -> Result<Page<Invoice>> {
        self.list_page("/invoices", params, expand::INVOICE, invoice::to_canonical)
            .await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    async fn create_transaction(&self, record: &Transaction) -> Result<Transaction> {
        let kind = record.transaction_type;
        self.post_transaction(kind, transaction::resource(kind), &transaction::to_params(record))
            .await
    }

    async fn get_transaction(&self, external_id: &str) -> Result<Transaction> {
        let kind = transaction_type_of(external_id)?;
        let path = format!("{}/{external_id}", transaction::resource(kind));
        let client = self.client()?;
        let missing = || not_found("transaction", external_id);

        Ok(match kind {
            TransactionType::PaymentIntent => {
                let intent: types::PaymentIntent = client
                    .get(&path, &expanded(expand::PAYMENT_INTENT))
                    .await
                    .map_err(missing())?;
                transaction::from_payment_intent(Some(&intent))
            }
            TransactionType::Charge => {
                let charge: types::Charge = client
                    .get(&path, &expanded(expand::CHARGE))
                    .await
                    .map_err(missing())?;
                transaction::from_charge(Some(&charge))
            }
            TransactionType::Refund => {
                let refund: types::Refund = client
                    .get(&path, &expanded(expand::REFUND))
                    .await
                    .map_err(missing())?;
                transaction::from_refund(Some(&refund))
            }
        })
    }

    async fn update_transaction(&self, record: &Transaction) -> Result<Transaction> {
        let id = external_id("transaction", record)?;
        let kind = record.transaction_type;
        let path = format!("{}/{id}", transaction::resource(kind));
        self.post_transaction(kind, &path, &transaction::to_update_params(record))
            .await
            .map_err(not_found("transaction", id))
    }

    /// Cancels a payment intent or a pending refund. Charges cannot be
    /// deleted.
    async fn delete_transaction(&self, external_id: &str) -> Result<()> {
        let kind = transaction_type_of(external_id)?;
        if kind == TransactionType::Charge {
            return Err(ProviderError::Unsupported(
                "charges cannot be deleted; refund them instead".into(),
            ));
        }
        let path = format!("{}/{external_id}/cancel", transaction::resource(kind));
        self.post_transaction(kind, &path, &FormParams::new())
            .await
            .map_err(not_found("transaction", external_id))?;
        Ok(())
    }

    async fn list_transactions(&self, params: &ListParams) -> Result<Page<Transaction>> {
        let kind = match params.filters.get("type") {
            Some(name) => TransactionType::parse(name).ok_or_else(|| {
                ProviderError::InvalidInput(format!("unknown transaction type {name}"))
            })?,
            None => TransactionType::PaymentIntent,
        };
        let path = transaction::resource(kind);

        match kind {
            TransactionType::PaymentIntent => {
                self.list_page(
                    path,
                    params,
                    expand::PAYMENT_INTENT,
                    transaction::from_payment_intent,
                )
                .await
            }
            TransactionType::Charge => {
                self.list_page(path, params, expand::CHARGE, transaction::from_charge)
                    .await
            }
            TransactionType::Refund => {
                self.list_page(path, params, expand::REFUND, transaction::from_refund)
                    .await
            }
        }
    }

    // =========================================================================
    // Webhooks and sync
    // =========================================================================

    fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> std::result::Result<WebhookEvent, WebhookError> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            WebhookError::Configuration("webhook secret not configured".into())
        })?;

        if let Err(reason) =
            webhook::verify_signature(secret, payload, signature, self.webhook_tolerance)
        {
            warn!(%reason, bytes = payload.len(), "Stripe webhook signature rejected");
            return Err(WebhookError::InvalidSignature {
                event: Box::new(WebhookEvent::unverified(PROVIDER_NAME, payload)),
                reason,
            });
        }

        let event = webhook::parse_event(payload)?;
        debug!(
            event_id = %event.provider_event_id,
            event_type = %event.event_type,
            "Stripe webhook verified"
        );
        Ok(event)
    }

    async fn start_initial_sync(
        &self,
        workspace_id: WorkspaceId,
        config: InitialSyncConfig,
    ) -> std::result::Result<SyncTask, SyncError> {
        self.client()?;

        let provider: Arc<dyn PaymentProvider> = Arc::new(self.clone());
        SyncOrchestrator::new(provider, Arc::clone(&self.store))
            .with_default_wallet(self.default_wallet_id)
            .start(workspace_id, config)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysync_store::MemoryStore;

    fn provider() -> StripeProvider {
        StripeProvider::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn configure_requires_api_key() {
        let mut stripe = provider();
        let err = stripe.configure(&Credentials::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(!stripe.is_configured());

        let err = stripe.configure(&Credentials::with_api_key("  ")).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn configure_is_repeatable() {
        let mut stripe = provider();
        stripe
            .configure(&Credentials::with_api_key("sk_test_1").webhook_secret("whsec_1"))
            .unwrap();
        stripe
            .configure(
                &Credentials::with_api_key("sk_test_2").option(WEBHOOK_TOLERANCE_OPTION, "0"),
            )
            .unwrap();
        assert!(stripe.is_configured());
        assert!(stripe.webhook_secret.is_none());
        assert_eq!(stripe.webhook_tolerance, Duration::ZERO);
    }

    #[test]
    fn reconfigure_without_tolerance_restores_default() {
        let mut stripe = provider();
        stripe
            .configure(
                &Credentials::with_api_key("sk_test_1").option(WEBHOOK_TOLERANCE_OPTION, "0"),
            )
            .unwrap();
        assert_eq!(stripe.webhook_tolerance, Duration::ZERO);

        stripe
            .configure(&Credentials::with_api_key("sk_test_2"))
            .unwrap();
        assert_eq!(stripe.webhook_tolerance, DEFAULT_TOLERANCE);
    }

    #[test]
    fn bad_tolerance_option_is_rejected() {
        let mut stripe = provider();
        let creds = Credentials::with_api_key("sk_test_1").option(WEBHOOK_TOLERANCE_OPTION, "soon");
        assert!(matches!(
            stripe.configure(&creds),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn operations_need_configuration() {
        let stripe = provider();
        assert!(matches!(
            stripe.get_customer("cus_1").await,
            Err(ProviderError::NotConfigured)
        ));
        assert!(matches!(
            stripe.check_connection().await,
            Err(ProviderError::NotConfigured)
        ));
        let started = stripe
            .start_initial_sync(WorkspaceId::generate(), InitialSyncConfig::default())
            .await;
        assert!(matches!(
            started,
            Err(SyncError::Provider(ProviderError::NotConfigured))
        ));
    }

    #[tokio::test]
    async fn updates_need_an_external_id() {
        let mut stripe = provider();
        stripe.configure(&Credentials::with_api_key("sk_test_1")).unwrap();
        let err = stripe.update_customer(&Customer::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn charges_cannot_be_deleted() {
        let mut stripe = provider();
        stripe.configure(&Credentials::with_api_key("sk_test_1")).unwrap();
        assert!(matches!(
            stripe.delete_transaction("ch_1").await,
            Err(ProviderError::Unsupported(_))
        ));
        assert!(matches!(
            stripe.delete_transaction("cus_1").await,
            Err(ProviderError::InvalidInput(_))
        ));
    }

    #[test]
    fn webhook_without_secret_is_a_configuration_error() {
        let stripe = provider();
        let err = stripe.handle_webhook(b"{}", "t=1,v1=00").unwrap_err();
        assert!(matches!(err, WebhookError::Configuration(_)));
    }

    #[test]
    fn debug_redacts_webhook_secret() {
        let mut stripe = provider();
        stripe
            .configure(&Credentials::with_api_key("sk_test_1").webhook_secret("whsec_hidden"))
            .unwrap();
        let shown = format!("{stripe:?}");
        assert!(!shown.contains("whsec_hidden"));
        assert!(!shown.contains("sk_test_1"));
    }
}
