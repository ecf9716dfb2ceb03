//! Product records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{impl_sync_record, EntityType};
use crate::ids::{ProductId, WalletId, WorkspaceId};
use crate::sync::{Metadata, ProviderSync};

/// A sellable product.
///
/// Belongs to exactly one workspace and settles into exactly one wallet. Both
/// are assigned at reconciliation time from the sync context; the provider
/// knows neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Internal id, assigned by the store.
    pub id: Option<ProductId>,

    /// Owning workspace.
    pub workspace_id: Option<WorkspaceId>,

    /// Settlement wallet.
    pub wallet_id: Option<WalletId>,

    /// Display name.
    pub name: String,

    /// Long description.
    pub description: Option<String>,

    /// Whether the product can be purchased.
    pub active: bool,

    /// Image URLs.
    pub images: Vec<String>,

    /// Unit label shown on receipts (e.g. "seat").
    pub unit_label: Option<String>,

    /// Provider tax code.
    pub tax_code: Option<String>,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,

    /// Provider bookkeeping.
    pub sync: ProviderSync,

    /// When the provider created the product.
    pub created_at: Option<DateTime<Utc>>,

    /// When the internal record was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Product, EntityType::Products);

impl Product {
    /// Copy provider-owned fields from `incoming`. Workspace and wallet are
    /// never touched.
    pub fn apply(&mut self, incoming: &Self) {
        self.name.clone_from(&incoming.name);
        self.description.clone_from(&incoming.description);
        self.active = incoming.active;
        self.images.clone_from(&incoming.images);
        self.unit_label.clone_from(&incoming.unit_label);
        self.tax_code.clone_from(&incoming.tax_code);
        self.metadata.clone_from(&incoming.metadata);
    }
}
