//! Sync sessions and their append-only audit events.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{BillingError, Result};
use crate::ids::{SyncEventId, SyncSessionId, WorkspaceId};

// ============================================================================
// Constants
// ============================================================================

/// Page size used when a config leaves `batch_size` at zero.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Retry attempts used when a config leaves `max_retries` at zero.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base retry delay used when a config leaves `retry_delay` at zero.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Settings for a bulk initial sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSyncConfig {
    /// Items per provider page.
    pub batch_size: u32,

    /// Entity type names, processed in this order. Unknown names are skipped.
    pub entity_types: Vec<String>,

    /// Page every entity type from the beginning, ignoring the cursors below.
    pub full_sync: bool,

    /// Start after this external id (first page only).
    pub starting_after: Option<String>,

    /// End before this external id (first page only).
    pub ending_before: Option<String>,

    /// Retries on transient provider failures before giving up on a page.
    pub max_retries: u32,

    /// Base delay between attempts.
    pub retry_delay: Duration,
}

impl InitialSyncConfig {
    /// Fill zero-valued fields with their defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.entity_types.is_empty() {
            self.entity_types = EntityType::DEFAULT_SYNC_ORDER
                .iter()
                .map(|e| e.as_str().to_string())
                .collect();
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.retry_delay.is_zero() {
            self.retry_delay = DEFAULT_RETRY_DELAY;
        }
        self
    }
}

/// What kind of work a session performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Bulk import of everything the provider has.
    #[default]
    InitialSync,
    /// Changes since a previous session.
    Incremental,
    /// Re-application of stored webhook events.
    Replay,
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, not started.
    #[default]
    Pending,
    /// The background task is working.
    Running,
    /// Every entity type finished without a terminal error.
    Completed,
    /// At least one entity type reported a terminal error.
    Failed,
}

impl SessionStatus {
    /// The wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded unit of bulk sync work.
///
/// The persisted session is the durable handle of the background task that
/// runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSession {
    /// Session id.
    pub id: SyncSessionId,

    /// Workspace being synced.
    pub workspace_id: WorkspaceId,

    /// Provider name.
    pub provider: String,

    /// Session kind.
    pub session_type: SessionType,

    /// Lifecycle status.
    pub status: SessionStatus,

    /// Entity types in processing order.
    pub entity_types: Vec<String>,

    /// The effective config, as JSON.
    pub config: serde_json::Value,

    /// Progress counters, as JSON.
    pub progress: serde_json::Value,

    /// Last failure per entity type, as JSON. Always set on failed sessions.
    pub error_summary: Option<serde_json::Value>,

    /// When the session started running.
    pub started_at: Option<DateTime<Utc>>,

    /// When the session reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session was last written.
    pub updated_at: DateTime<Utc>,
}

impl SyncSession {
    /// A new pending initial-sync session.
    #[must_use]
    pub fn initial(
        workspace_id: WorkspaceId,
        provider: impl Into<String>,
        config: &InitialSyncConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SyncSessionId::generate(),
            workspace_id,
            provider: provider.into(),
            session_type: SessionType::InitialSync,
            status: SessionStatus::Pending,
            entity_types: config.entity_types.clone(),
            config: serde_json::to_value(config).unwrap_or(serde_json::Value::Null),
            progress: serde_json::json!({}),
            error_summary: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to`, stamping start/completion times.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidSessionTransition` unless the move is
    /// `pending → running` or `running → completed | failed`.
    pub fn transition(&mut self, to: SessionStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (SessionStatus::Pending, SessionStatus::Running)
                | (
                    SessionStatus::Running,
                    SessionStatus::Completed | SessionStatus::Failed
                )
        );
        if !allowed {
            return Err(BillingError::InvalidSessionTransition {
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        if to == SessionStatus::Running {
            self.started_at = Some(now);
        }
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

/// Kind of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventType {
    /// An entity type started.
    SyncStarted,
    /// An item was reconciled.
    SyncCompleted,
    /// An item or an entity type failed.
    SyncFailed,
}

/// An immutable audit row of a sync session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Event id, time-ordered.
    pub id: SyncEventId,

    /// Owning session.
    pub session_id: SyncSessionId,

    /// Entity type name.
    pub entity_type: String,

    /// External id of the item, if the event concerns one.
    pub entity_id: Option<String>,

    /// Event kind.
    pub event_type: SyncEventType,

    /// Human readable message.
    pub message: String,

    /// Structured details.
    pub details: serde_json::Value,

    /// When the event was written.
    pub created_at: DateTime<Utc>,
}

impl SyncEvent {
    /// A new event without entity or details.
    #[must_use]
    pub fn new(
        session_id: SyncSessionId,
        entity_type: impl Into<String>,
        event_type: SyncEventType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: SyncEventId::generate(),
            session_id,
            entity_type: entity_type.into(),
            entity_id: None,
            event_type,
            message: message.into(),
            details: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Attach the item's external id.
    #[must_use]
    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_zero_values() {
        let config = InitialSyncConfig::default().with_defaults();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(
            config.entity_types,
            vec!["customers", "products", "prices", "subscriptions"]
        );
    }

    #[test]
    fn defaults_keep_explicit_values() {
        let config = InitialSyncConfig {
            batch_size: 10,
            entity_types: vec!["invoices".into()],
            max_retries: 1,
            retry_delay: Duration::from_millis(5),
            ..InitialSyncConfig::default()
        }
        .with_defaults();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.entity_types, vec!["invoices"]);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay, Duration::from_millis(5));
    }

    #[test]
    fn session_lifecycle() {
        let config = InitialSyncConfig::default().with_defaults();
        let mut session = SyncSession::initial(WorkspaceId::generate(), "stripe", &config);
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.config["batch_size"], 100);

        session.transition(SessionStatus::Running).unwrap();
        assert!(session.started_at.is_some());
        assert!(session.completed_at.is_none());

        session.transition(SessionStatus::Failed).unwrap();
        assert!(session.completed_at.is_some());

        let err = session.transition(SessionStatus::Running).unwrap_err();
        assert_eq!(
            err,
            BillingError::InvalidSessionTransition {
                from: SessionStatus::Failed,
                to: SessionStatus::Running,
            }
        );
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let mut session =
            SyncSession::initial(WorkspaceId::generate(), "stripe", &InitialSyncConfig::default());
        assert!(session.transition(SessionStatus::Completed).is_err());
    }
}
