//! Webhook ingestion: verify, log, reconcile.

use std::sync::Arc;

use paysync_core::{WebhookEvent, WebhookEventId};
use paysync_store::Store;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, WebhookError};
use crate::provider::PaymentProvider;
use crate::reconcile::{Applied, Reconciler, SyncContext};

/// Result of ingesting one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// The verified event. For a duplicate delivery this carries the id of
    /// the first recorded copy.
    pub event: WebhookEvent,

    /// Whether the provider event id had been recorded before.
    pub duplicate: bool,

    /// The record the payload was applied to, if the payload was recognized.
    pub applied: Option<Applied>,
}

/// Runs deliveries for one workspace through the adapter and reconciler.
///
/// Every verified delivery is applied, duplicates included; reconciliation is
/// idempotent and the version counter records each application.
#[derive(Clone)]
pub struct WebhookProcessor {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn Store>,
    reconciler: Reconciler,
}

impl WebhookProcessor {
    /// A processor writing into `store` under `context`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        store: Arc<dyn Store>,
        context: SyncContext,
    ) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store), context);
        Self {
            provider,
            store,
            reconciler,
        }
    }

    /// Verify and apply one delivery.
    ///
    /// A delivery that fails verification touches nothing.
    ///
    /// # Errors
    ///
    /// Returns the adapter's `WebhookError` for bad signatures or bodies, and
    /// `WebhookError::Reconcile` if the event cannot be logged or applied.
    pub fn process(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<IngestOutcome, WebhookError> {
        let provider = self.provider.service_name();

        let mut event = match self.provider.handle_webhook(payload, signature) {
            Ok(event) => event,
            Err(e @ WebhookError::InvalidSignature { .. }) => {
                warn!(provider, error = %e, "Rejected webhook with invalid signature");
                return Err(e);
            }
            Err(e) => {
                warn!(provider, stage = %e.stage(), error = %e, "Webhook ingestion failed");
                return Err(e);
            }
        };
        event.id.get_or_insert_with(WebhookEventId::generate);

        let recorded = self
            .store
            .record_webhook_event(&event)
            .map_err(ReconcileError::from)?;
        let duplicate = !recorded;
        if duplicate {
            debug!(
                provider,
                provider_event_id = %event.provider_event_id,
                "Duplicate webhook delivery"
            );
            if let Some(first) = self
                .store
                .get_webhook_event(provider, &event.provider_event_id)
                .map_err(ReconcileError::from)?
            {
                event.id = first.id;
            }
        }

        let applied = match event.data.as_ref() {
            Some(data) => self
                .reconciler
                .reconcile_webhook_data(data, event.is_deletion())?,
            None => None,
        };

        info!(
            provider,
            provider_event_id = %event.provider_event_id,
            event_type = %event.event_type,
            duplicate,
            applied = applied.is_some(),
            "Webhook processed"
        );

        Ok(IngestOutcome {
            event,
            duplicate,
            applied,
        })
    }
}
