//! Service error type.

use paysync_store::StoreError;
use paysync_sync::{ProviderError, SyncError, WebhookError};

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Sync session could not be started or joined.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Webhook rejected or not applied.
    #[error("webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Session summary could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
