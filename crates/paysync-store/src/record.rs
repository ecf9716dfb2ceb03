//! How each canonical entity is keyed in storage.

use paysync_core::{
    Customer, Invoice, Price, Product, Subscription, SyncRecord, Transaction, WorkspaceId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::keys;

/// A canonical entity the store can hold.
///
/// Rows are keyed by internal id and indexed by
/// `(provider, scope, external_id)`, where `scope` is the workspace for
/// workspace-owned entities and global otherwise.
pub trait Record: SyncRecord + Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Entity name used in errors.
    const NAME: &'static str;

    /// Internal id, if assigned.
    fn row_id(&self) -> Option<uuid::Uuid>;

    /// Workspace scope of the external-id index.
    fn scope(&self) -> Option<WorkspaceId>;

    /// The row key. Fails if no internal id was assigned.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRecord` if the record has no internal id.
    fn require_row_key(&self) -> Result<Vec<u8>> {
        self.row_id()
            .map(|id| keys::row_key(&id))
            .ok_or_else(|| StoreError::InvalidRecord(format!("{} has no internal id", Self::NAME)))
    }

    /// The external-id index key. Fails if no provider is recorded.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRecord` if the provider or external id is
    /// missing.
    fn require_external_key(&self) -> Result<Vec<u8>> {
        let sync = self.sync();
        let provider = sync.provider.as_deref().ok_or_else(|| {
            StoreError::InvalidRecord(format!("{} has no payment provider", Self::NAME))
        })?;
        if sync.external_id.is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "{} has no external id",
                Self::NAME
            )));
        }
        Ok(keys::external_key(
            provider,
            self.scope().as_ref(),
            &sync.external_id,
        ))
    }

    /// Row id rendered for error messages.
    fn display_id(&self) -> String {
        self.row_id().map(|id| id.to_string()).unwrap_or_default()
    }
}

impl Record for Customer {
    const NAME: &'static str = "customer";

    fn row_id(&self) -> Option<uuid::Uuid> {
        self.id.map(|id| *id.as_uuid())
    }

    fn scope(&self) -> Option<WorkspaceId> {
        None
    }
}

impl Record for Product {
    const NAME: &'static str = "product";

    fn row_id(&self) -> Option<uuid::Uuid> {
        self.id.map(|id| *id.as_uuid())
    }

    fn scope(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}

impl Record for Price {
    const NAME: &'static str = "price";

    fn row_id(&self) -> Option<uuid::Uuid> {
        self.id.map(|id| *id.as_uuid())
    }

    fn scope(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}

impl Record for Subscription {
    const NAME: &'static str = "subscription";

    fn row_id(&self) -> Option<uuid::Uuid> {
        self.id.map(|id| *id.as_uuid())
    }

    fn scope(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}

impl Record for Invoice {
    const NAME: &'static str = "invoice";

    fn row_id(&self) -> Option<uuid::Uuid> {
        self.id.map(|id| *id.as_uuid())
    }

    fn scope(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}

impl Record for Transaction {
    const NAME: &'static str = "transaction";

    fn row_id(&self) -> Option<uuid::Uuid> {
        self.id.map(|id| *id.as_uuid())
    }

    fn scope(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }
}
