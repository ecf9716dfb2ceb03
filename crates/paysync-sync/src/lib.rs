//! Synchronization engine for paysync.
//!
//! This crate connects provider adapters to the store:
//!
//! - [`PaymentProvider`]: the adapter contract every payment platform implements
//! - [`Reconciler`]: idempotent create-or-update of canonical records
//! - [`WebhookProcessor`]: verify, log and apply inbound webhooks
//! - [`SyncOrchestrator`]: bulk initial sync on a background task
//! - [`RetryPolicy`]: exponential backoff around provider calls
//!
//! # Data flow
//!
//! ```text
//! provider list page ─┐
//!                     ├─> canonical record ─> Reconciler ─> Store
//! verified webhook ───┘
//! ```
//!
//! Adapters map provider objects to canonical types; nothing past the
//! adapter sees provider-native data.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod reconcile;
pub mod retry;
pub mod webhook;

pub use error::{IngestStage, ProviderError, ReconcileError, Result, SyncError, WebhookError};
pub use orchestrator::{SyncOrchestrator, SyncTask};
pub use progress::{ErrorSummary, FailureEntry, SyncProgress};
pub use provider::{Credentials, PaymentProvider};
pub use reconcile::{Applied, Reconciled, Reconciler, SyncContext, UpsertAction};
pub use retry::RetryPolicy;
pub use webhook::{IngestOutcome, WebhookProcessor};
