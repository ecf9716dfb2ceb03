//! Error types for provider adapters, reconciliation and ingestion.

use std::fmt;
use std::time::Duration;

use paysync_core::{BillingError, WebhookEvent};
use paysync_store::StoreError;

/// Result type for provider adapter operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors raised by a provider adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Credentials are missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was called before `configure`.
    #[error("provider is not configured")]
    NotConfigured,

    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with an error.
    #[error("API error ({status}): {error_type} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider error type.
        error_type: String,
        /// Provider error message.
        message: String,
        /// Provider error code.
        code: Option<String>,
    },

    /// The provider has no such object.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of object.
        entity: &'static str,
        /// The external id that was looked up.
        id: String,
    },

    /// The provider asked us to slow down.
    #[error("rate limited by provider")]
    RateLimited {
        /// Delay the provider asked for, if any.
        retry_after: Option<Duration>,
    },

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The provider has no equivalent for the operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The canonical record cannot be sent as given.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A transient failure outlasted the retry policy.
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        /// Operation name.
        operation: String,
        /// Attempts made.
        attempts: u32,
        /// The final error.
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Whether a retry might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 409,
            _ => false,
        }
    }
}

/// Where in the ingestion pipeline a webhook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Body received, nothing checked yet.
    Received,
    /// Signature checked.
    Verified,
    /// Envelope decoded.
    Parsed,
    /// Payload mapped to a canonical record.
    Mapped,
    /// Event handed to reconciliation.
    Emitted,
}

impl IngestStage {
    /// The stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Parsed => "parsed",
            Self::Mapped => "mapped",
            Self::Emitted => "emitted",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while ingesting a webhook.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The signature header did not verify. The event carries the raw body
    /// and `signature_valid == false`.
    #[error("invalid webhook signature: {reason}")]
    InvalidSignature {
        /// The unverified event.
        event: Box<WebhookEvent>,
        /// Why verification failed.
        reason: String,
    },

    /// The body could not be decoded or mapped.
    #[error("malformed webhook at stage {stage}: {message}")]
    Malformed {
        /// Stage that failed.
        stage: IngestStage,
        /// Decoder message.
        message: String,
    },

    /// The adapter cannot verify webhooks as configured.
    #[error("webhook configuration error: {0}")]
    Configuration(String),

    /// The verified event could not be applied.
    #[error("webhook reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl WebhookError {
    /// Stage the failure belongs to.
    #[must_use]
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::InvalidSignature { .. } | Self::Configuration(_) => IngestStage::Received,
            Self::Malformed { stage, .. } => *stage,
            Self::Reconcile(_) => IngestStage::Emitted,
        }
    }

    /// The unverified event, for signature failures.
    #[must_use]
    pub fn unverified_event(&self) -> Option<&WebhookEvent> {
        match self {
            Self::InvalidSignature { event, .. } => Some(event),
            _ => None,
        }
    }
}

/// Errors raised by the reconciliation layer.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A referenced record has not been synced yet.
    #[error("{entity} not found: {external_id}")]
    MissingDependency {
        /// Kind of the referenced record.
        entity: &'static str,
        /// Its external id.
        external_id: String,
    },

    /// The incoming record has no external id.
    #[error("{0} has no external id")]
    MissingExternalId(&'static str),

    /// The incoming record breaks a model invariant.
    #[error(transparent)]
    Invalid(#[from] BillingError),

    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Concurrent writers kept moving the record.
    #[error("{entity} {external_id} changed concurrently {attempts} times")]
    Contended {
        /// Kind of record.
        entity: &'static str,
        /// Its external id.
        external_id: String,
        /// Attempts made.
        attempts: usize,
    },
}

/// Errors raised when starting or awaiting a sync session.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The session could not be persisted.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The session state machine refused a transition.
    #[error(transparent)]
    Model(#[from] BillingError),

    /// The provider refused to start.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The background task panicked or was aborted.
    #[error("sync task failed: {0}")]
    Task(String),
}
