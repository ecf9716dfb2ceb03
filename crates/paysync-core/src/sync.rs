//! Provider-sync bookkeeping shared by every canonical entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form string metadata attached to entities.
pub type Metadata = HashMap<String, String>;

/// Whether the internal record currently mirrors the provider's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSyncStatus {
    /// Never synchronized.
    #[default]
    Unsynced,
    /// Last sync succeeded.
    Synced,
    /// Last sync failed.
    Error,
}

/// Link between an internal record and its provider-native counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSync {
    /// The provider's identifier for the record (e.g. `cus_...`).
    pub external_id: String,

    /// Name of the provider the record is synced with.
    pub provider: Option<String>,

    /// Current sync status.
    pub status: PaymentSyncStatus,

    /// When the record was last successfully synced.
    pub synced_at: Option<DateTime<Utc>>,

    /// Incremented by one on every successful sync; 0 means never synced.
    pub version: i64,
}

impl ProviderSync {
    /// Unsynced bookkeeping for a record the provider knows as `external_id`.
    #[must_use]
    pub fn external(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            ..Self::default()
        }
    }

    /// Mark a successful sync and bump the version.
    pub fn mark_synced(&mut self, provider: &str, at: DateTime<Utc>) {
        self.provider = Some(provider.to_string());
        self.status = PaymentSyncStatus::Synced;
        self.synced_at = Some(at);
        self.version += 1;
    }

    /// Whether this record has an external id at all.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        !self.external_id.is_empty()
    }
}
