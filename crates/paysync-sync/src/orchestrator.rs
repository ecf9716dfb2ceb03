//! Bulk initial sync on a background task.
//!
//! A session walks its entity types in the configured order, pages each one
//! from the provider and reconciles every item. Item failures are recorded
//! and skipped; a page that cannot be fetched ends the entity type. The
//! session is persisted after every page so its progress can be polled.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use paysync_core::{
    Customer, EntityType, InitialSyncConfig, Invoice, ListParams, Page, Price, Product,
    SessionStatus, Subscription, SyncEvent, SyncEventType, SyncSession, SyncSessionId,
    Transaction, TransactionType, WalletId, WorkspaceId,
};
use paysync_store::{Record, Store};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, Result, SyncError};
use crate::progress::{ErrorSummary, SyncProgress, CANCELLED_KEY};
use crate::provider::PaymentProvider;
use crate::reconcile::{self, Applied, Reconciled, Reconciler, SyncContext};
use crate::retry::RetryPolicy;

/// Handle of a running initial sync.
///
/// Dropping the handle leaves the task running; the persisted session stays
/// the source of truth.
#[derive(Debug)]
pub struct SyncTask {
    session: SyncSession,
    cancel: CancellationToken,
    handle: JoinHandle<SyncSession>,
}

impl SyncTask {
    /// The session as it was when the task started.
    #[must_use]
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SyncSessionId {
        self.session.id
    }

    /// Ask the task to stop. It finishes the item in hand, then fails the
    /// session with a `cancelled` error summary entry.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this task.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task and return the final session.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Task` if the task panicked or was aborted.
    pub async fn wait(self) -> std::result::Result<SyncSession, SyncError> {
        self.handle
            .await
            .map_err(|e| SyncError::Task(e.to_string()))
    }

    /// Let the task run on unobserved.
    pub fn detach(self) -> SyncSession {
        self.session
    }
}

/// Starts initial sync sessions for one provider.
#[derive(Clone)]
pub struct SyncOrchestrator {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn Store>,
    default_wallet_id: Option<WalletId>,
}

impl SyncOrchestrator {
    /// An orchestrator syncing `provider` into `store`.
    #[must_use]
    pub fn new(provider: Arc<dyn PaymentProvider>, store: Arc<dyn Store>) -> Self {
        Self {
            provider,
            store,
            default_wallet_id: None,
        }
    }

    /// Wallet given to products whose metadata names none.
    #[must_use]
    pub fn with_default_wallet(mut self, wallet_id: Option<WalletId>) -> Self {
        self.default_wallet_id = wallet_id;
        self
    }

    /// Persist a new session, mark it running and spawn its task.
    ///
    /// # Errors
    ///
    /// Returns a store error if the session cannot be written.
    pub async fn start(
        &self,
        workspace_id: WorkspaceId,
        config: InitialSyncConfig,
    ) -> std::result::Result<SyncTask, SyncError> {
        let config = config.with_defaults();
        let provider = self.provider.service_name();

        let mut session = SyncSession::initial(workspace_id, provider, &config);
        self.store.insert_sync_session(&session)?;

        session.transition(SessionStatus::Running)?;
        session.progress = SyncProgress {
            started_at: session.started_at,
            ..SyncProgress::default()
        }
        .to_value();
        self.store.update_sync_session(&session)?;

        info!(
            session_id = %session.id,
            %workspace_id,
            provider,
            entity_types = ?config.entity_types,
            batch_size = config.batch_size,
            "Initial sync started"
        );

        let mut context = SyncContext::new(provider, workspace_id);
        if let Some(wallet_id) = self.default_wallet_id {
            context = context.with_default_wallet(wallet_id);
        }

        let cancel = CancellationToken::new();
        let run = SessionRun {
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            reconciler: Reconciler::new(Arc::clone(&self.store), context),
            retry: RetryPolicy::from_config(&config),
            config,
            session_id: session.id,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(run.run(session.clone()));

        Ok(SyncTask {
            session,
            cancel,
            handle,
        })
    }
}

type ListFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Page<T>>> + Send + 'a>>;

/// Per entity kind list and reconcile calls.
trait SyncKind: Record + 'static {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self>;

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>>;

    /// Filter sets paged one after another.
    fn passes() -> Vec<HashMap<String, String>> {
        vec![HashMap::new()]
    }
}

impl SyncKind for Customer {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self> {
        provider.list_customers(params)
    }

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>> {
        reconciler.reconcile_customer(item)
    }
}

impl SyncKind for Product {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self> {
        provider.list_products(params)
    }

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>> {
        reconciler.reconcile_product(item)
    }
}

impl SyncKind for Price {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self> {
        provider.list_prices(params)
    }

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>> {
        reconciler.reconcile_price(item)
    }
}

impl SyncKind for Subscription {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self> {
        provider.list_subscriptions(params)
    }

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>> {
        reconciler.reconcile_subscription(item)
    }
}

impl SyncKind for Invoice {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self> {
        provider.list_invoices(params)
    }

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>> {
        reconciler.reconcile_invoice(item)
    }
}

impl SyncKind for Transaction {
    fn list<'a>(provider: &'a dyn PaymentProvider, params: &'a ListParams) -> ListFuture<'a, Self> {
        provider.list_transactions(params)
    }

    fn reconcile(reconciler: &Reconciler, item: &Self) -> reconcile::Result<Reconciled<Self>> {
        reconciler.reconcile_transaction(item)
    }

    fn passes() -> Vec<HashMap<String, String>> {
        [
            TransactionType::PaymentIntent,
            TransactionType::Charge,
            TransactionType::Refund,
        ]
        .into_iter()
        .map(|kind| HashMap::from([("type".to_string(), kind.as_str().to_string())]))
        .collect()
    }
}

/// Why an entity type stopped early.
enum TypeFailure {
    Provider(ProviderError),
    Cancelled,
}

/// Mutable state of a running session.
struct Tracker {
    session: SyncSession,
    progress: SyncProgress,
    errors: ErrorSummary,
}

struct SessionRun {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn Store>,
    reconciler: Reconciler,
    retry: RetryPolicy,
    config: InitialSyncConfig,
    session_id: SyncSessionId,
    cancel: CancellationToken,
}

impl SessionRun {
    #[tracing::instrument(
        name = "initial_sync",
        skip_all,
        fields(session_id = %session.id, workspace_id = %session.workspace_id)
    )]
    async fn run(self, session: SyncSession) -> SyncSession {
        let mut tracker = Tracker {
            progress: SyncProgress::from_session(&session),
            errors: ErrorSummary::default(),
            session,
        };

        for name in &self.config.entity_types {
            if self.cancel.is_cancelled() {
                tracker
                    .errors
                    .record_terminal(CANCELLED_KEY, "sync cancelled".to_string());
                break;
            }

            let Ok(kind) = name.parse::<EntityType>() else {
                warn!(entity_type = %name, "Skipping unknown entity type");
                continue;
            };

            let outcome = match kind {
                EntityType::Customers => self.sync_kind::<Customer>(&mut tracker).await,
                EntityType::Products => self.sync_kind::<Product>(&mut tracker).await,
                EntityType::Prices => self.sync_kind::<Price>(&mut tracker).await,
                EntityType::Subscriptions => self.sync_kind::<Subscription>(&mut tracker).await,
                EntityType::Invoices => self.sync_kind::<Invoice>(&mut tracker).await,
                EntityType::Transactions => self.sync_kind::<Transaction>(&mut tracker).await,
            };

            match outcome {
                Ok(()) => {}
                Err(TypeFailure::Cancelled) => {
                    info!(entity_type = %kind, "Sync cancelled");
                    tracker
                        .errors
                        .record_terminal(CANCELLED_KEY, "sync cancelled".to_string());
                    break;
                }
                Err(TypeFailure::Provider(e)) => {
                    error!(entity_type = %kind, error = %e, "Entity type sync failed");
                    tracker.errors.record_terminal(kind.as_str(), e.to_string());
                    self.emit(SyncEvent::new(
                        self.session_id,
                        kind.as_str(),
                        SyncEventType::SyncFailed,
                        format!("{kind} sync failed: {e}"),
                    ));
                    self.persist(&mut tracker);
                }
            }
        }

        self.finish(tracker)
    }

    async fn sync_kind<T: SyncKind>(
        &self,
        tracker: &mut Tracker,
    ) -> std::result::Result<(), TypeFailure> {
        let name = T::ENTITY_TYPE.as_str();
        let operation = format!("list {name}");
        let provider = self.provider.as_ref();

        self.emit(SyncEvent::new(
            self.session_id,
            name,
            SyncEventType::SyncStarted,
            format!("Starting {name} sync"),
        ));
        tracker.progress.entity_mut(name).started_at = Some(Utc::now());

        for filters in T::passes() {
            let mut params = ListParams {
                limit: self.config.batch_size,
                filters,
                ..ListParams::default()
            };
            if !self.config.full_sync {
                params.starting_after.clone_from(&self.config.starting_after);
                params.ending_before.clone_from(&self.config.ending_before);
            }

            loop {
                let page = tokio::select! {
                    () = self.cancel.cancelled() => return Err(TypeFailure::Cancelled),
                    page = self.retry.execute(&operation, || T::list(provider, &params)) => {
                        page.map_err(TypeFailure::Provider)?
                    }
                };
                tracker.progress.entity_mut(name).pages += 1;
                debug!(
                    entity_type = name,
                    items = page.items.len(),
                    has_more = page.next_cursor.is_some(),
                    "Fetched page"
                );

                for item in &page.items {
                    if self.cancel.is_cancelled() {
                        self.persist(tracker);
                        return Err(TypeFailure::Cancelled);
                    }
                    self.apply(item, tracker);
                }
                self.persist(tracker);

                if page.next_cursor.is_none() {
                    break;
                }
                if params.ending_before.is_some() {
                    // Walking backward from `ending_before`.
                    params.ending_before =
                        page.items.first().map(|item| item.external_id().to_string());
                    params.starting_after = None;
                } else {
                    params.starting_after = page.next_cursor;
                }
            }
        }

        let entity = tracker.progress.entity_mut(name);
        entity.completed_at = Some(Utc::now());
        info!(
            entity_type = name,
            processed = entity.processed,
            failed = entity.failed,
            pages = entity.pages,
            "Entity type synced"
        );
        self.persist(tracker);
        Ok(())
    }

    fn apply<T: SyncKind>(&self, item: &T, tracker: &mut Tracker) {
        let name = T::ENTITY_TYPE.as_str();
        let external_id = item.external_id();

        match T::reconcile(&self.reconciler, item) {
            Ok(reconciled) => {
                let applied = Applied::from(&reconciled);
                tracker.progress.record_processed(name);
                self.emit(
                    SyncEvent::new(
                        self.session_id,
                        name,
                        SyncEventType::SyncCompleted,
                        format!("{} {name} {external_id}", applied.action.as_str()),
                    )
                    .with_entity(external_id)
                    .with_details(json!({
                        "action": applied.action.as_str(),
                        "internal_id": applied.internal_id,
                        "version": applied.version,
                    })),
                );
            }
            Err(e) => {
                warn!(entity_type = name, external_id, error = %e, "Failed to reconcile item");
                tracker.progress.record_failed(name);
                tracker.errors.record_item(name, external_id, e.to_string());
                self.emit(
                    SyncEvent::new(
                        self.session_id,
                        name,
                        SyncEventType::SyncFailed,
                        e.to_string(),
                    )
                    .with_entity(external_id),
                );
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.store.append_sync_event(&event) {
            warn!(error = %e, event_type = ?event.event_type, "Failed to append sync event");
        }
    }

    fn persist(&self, tracker: &mut Tracker) {
        tracker.session.progress = tracker.progress.to_value();
        tracker.session.error_summary = tracker.errors.to_value();
        tracker.session.updated_at = Utc::now();
        if let Err(e) = self.store.update_sync_session(&tracker.session) {
            warn!(error = %e, "Failed to persist session progress");
        }
    }

    fn finish(&self, mut tracker: Tracker) -> SyncSession {
        let status = if tracker.errors.has_terminal() {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };

        tracker.progress.completed_at = Some(Utc::now());
        if let Err(e) = tracker.session.transition(status) {
            error!(error = %e, "Invalid session transition");
        }
        self.persist(&mut tracker);

        info!(
            status = %tracker.session.status,
            total_processed = tracker.progress.total_processed,
            total_failed = tracker.progress.total_failed,
            "Initial sync finished"
        );
        tracker.session
    }
}
