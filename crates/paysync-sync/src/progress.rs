//! Structured progress and error summaries persisted on sync sessions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use paysync_core::SyncSession;
use serde::{Deserialize, Serialize};

/// Error summary key used when a session is cancelled.
pub const CANCELLED_KEY: &str = "cancelled";

/// Counters for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProgress {
    /// Items reconciled.
    pub processed: u64,
    /// Items that failed.
    pub failed: u64,
    /// Provider pages fetched.
    pub pages: u64,
    /// When the entity type started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the entity type finished.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Session-wide progress, stored as the session's `progress` blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Items reconciled across all entity types.
    pub total_processed: u64,
    /// Items failed across all entity types.
    pub total_failed: u64,
    /// Per entity type counters, keyed by entity type name.
    pub entities: BTreeMap<String, EntityProgress>,
    /// When the session started running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the session finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncProgress {
    /// Read the progress stored on a session, or start fresh.
    #[must_use]
    pub fn from_session(session: &SyncSession) -> Self {
        serde_json::from_value(session.progress.clone()).unwrap_or_else(|_| Self {
            started_at: session.started_at,
            ..Self::default()
        })
    }

    /// Counters of one entity type, created on first use.
    pub fn entity_mut(&mut self, entity_type: &str) -> &mut EntityProgress {
        self.entities.entry(entity_type.to_string()).or_default()
    }

    /// Count a reconciled item.
    pub fn record_processed(&mut self, entity_type: &str) {
        self.entity_mut(entity_type).processed += 1;
        self.total_processed += 1;
    }

    /// Count a failed item.
    pub fn record_failed(&mut self, entity_type: &str) {
        self.entity_mut(entity_type).failed += 1;
        self.total_failed += 1;
    }

    /// As JSON.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// The last failure seen for an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Error message.
    pub message: String,
    /// External id of the failing item, if an item failed.
    pub external_id: Option<String>,
    /// Whether the whole entity type failed.
    pub terminal: bool,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Last failure per entity type, stored as the session's `error_summary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorSummary(BTreeMap<String, FailureEntry>);

impl ErrorSummary {
    /// Record an item failure, replacing an earlier one of the same type
    /// unless that one was terminal.
    pub fn record_item(&mut self, entity_type: &str, external_id: &str, message: String) {
        if self.0.get(entity_type).is_some_and(|e| e.terminal) {
            return;
        }
        self.0.insert(
            entity_type.to_string(),
            FailureEntry {
                message,
                external_id: Some(external_id.to_string()),
                terminal: false,
                at: Utc::now(),
            },
        );
    }

    /// Record a failure that ended the whole entity type.
    pub fn record_terminal(&mut self, entity_type: &str, message: String) {
        self.0.insert(
            entity_type.to_string(),
            FailureEntry {
                message,
                external_id: None,
                terminal: true,
                at: Utc::now(),
            },
        );
    }

    /// The entry of one entity type.
    #[must_use]
    pub fn get(&self, entity_type: &str) -> Option<&FailureEntry> {
        self.0.get(entity_type)
    }

    /// Whether any entity type ended terminally.
    #[must_use]
    pub fn has_terminal(&self) -> bool {
        self.0.values().any(|e| e.terminal)
    }

    /// Whether nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// As JSON, `None` when empty.
    #[must_use]
    pub fn to_value(&self) -> Option<serde_json::Value> {
        if self.is_empty() {
            None
        } else {
            serde_json::to_value(self).ok()
        }
    }
}
