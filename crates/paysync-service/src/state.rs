//! Application state.

use std::sync::Arc;

use paysync_core::SyncSession;
use paysync_store::Store;
use paysync_stripe::{StripeProvider, PROVIDER_NAME};
use paysync_sync::{PaymentProvider, SyncContext, WebhookProcessor};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// Application state shared by the binary and webhook handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Configured Stripe adapter (optional).
    pub stripe: Option<Arc<StripeProvider>>,
}

impl AppState {
    /// Create a new application state, configuring Stripe when a key is set.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Provider` if the Stripe credentials are rejected.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self> {
        let stripe = match config.stripe_credentials() {
            Some(credentials) => {
                let mut provider = StripeProvider::new(Arc::clone(&store));
                if let Some(wallet_id) = config.wallet_id {
                    provider = provider.with_default_wallet(wallet_id);
                }
                provider.configure(&credentials)?;
                tracing::info!(
                    webhooks = config.stripe_webhook_secret.is_some(),
                    "Stripe integration enabled"
                );
                Some(Arc::new(provider))
            }
            None => {
                tracing::warn!("Stripe not configured - sync and webhooks are unavailable");
                None
            }
        };

        Ok(Self {
            store,
            config,
            stripe,
        })
    }

    /// Check if Stripe is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }

    /// The Stripe adapter.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` if no Stripe key was configured.
    pub fn stripe(&self) -> Result<&Arc<StripeProvider>> {
        self.stripe
            .as_ref()
            .ok_or_else(|| ServiceError::config("STRIPE_API_KEY is not set"))
    }

    /// A webhook processor for Stripe deliveries into the configured workspace.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` if Stripe or the workspace is missing.
    pub fn webhook_processor(&self) -> Result<WebhookProcessor> {
        let workspace_id = self.config.require_workspace()?;
        let provider: Arc<dyn PaymentProvider> = self.stripe()?.clone();

        let mut context = SyncContext::new(PROVIDER_NAME, workspace_id);
        if let Some(wallet_id) = self.config.wallet_id {
            context = context.with_default_wallet(wallet_id);
        }
        Ok(WebhookProcessor::new(
            provider,
            Arc::clone(&self.store),
            context,
        ))
    }

    /// Verify the Stripe connection, then run an initial sync to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing, the connection check
    /// fails or the session cannot be started. A session that runs and fails
    /// is returned as `Ok` with status `failed`.
    pub async fn run_initial_sync(&self) -> Result<SyncSession> {
        let workspace_id = self.config.require_workspace()?;
        let stripe = self.stripe()?;

        stripe.check_connection().await?;
        tracing::info!(workspace_id = %workspace_id, "Stripe connection verified");

        let task = stripe
            .start_initial_sync(workspace_id, self.config.sync_config())
            .await?;
        tracing::info!(session_id = %task.id(), "Initial sync started");

        Ok(task.wait().await?)
    }
}

/// Open the configured storage backend.
///
/// # Errors
///
/// Returns `ServiceError::Store` if the database cannot be opened.
#[cfg(feature = "rocksdb-backend")]
pub fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(paysync_store::RocksStore::open(&config.data_dir)?))
}

/// Open the configured storage backend.
///
/// Without the `rocksdb-backend` feature this is an in-memory store.
///
/// # Errors
///
/// Never fails.
#[cfg(not(feature = "rocksdb-backend"))]
#[allow(clippy::unnecessary_wraps)]
pub fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>> {
    tracing::warn!(
        data_dir = %config.data_dir,
        "rocksdb-backend disabled - using an in-memory store"
    );
    Ok(Arc::new(paysync_store::MemoryStore::new()))
}
