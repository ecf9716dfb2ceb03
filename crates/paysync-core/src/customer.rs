//! Customer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{impl_sync_record, EntityType};
use crate::ids::{CustomerId, WorkspaceId};
use crate::sync::{Metadata, ProviderSync};

/// A billing customer.
///
/// Customers are not owned by a workspace: once a provider-wide external id is
/// known the same row is shared, and [`CustomerWorkspace`] links record which
/// workspaces it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Internal id, assigned by the store.
    pub id: Option<CustomerId>,

    /// Email address.
    pub email: Option<String>,

    /// Full name or business name.
    pub name: Option<String>,

    /// Phone number.
    pub phone: Option<String>,

    /// Free-form description.
    pub description: Option<String>,

    /// Billing address.
    pub address: Option<Address>,

    /// Shipping details.
    pub shipping: Option<Shipping>,

    /// Tax identifiers. `None` when the provider returned none (or the list
    /// was not expanded).
    pub tax_ids: Option<Vec<TaxId>>,

    /// Preferred invoice locales.
    pub preferred_locales: Vec<String>,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,

    /// Provider bookkeeping.
    pub sync: ProviderSync,

    /// When the provider created the customer.
    pub created_at: Option<DateTime<Utc>>,

    /// When the internal record was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Customer, EntityType::Customers);

impl Customer {
    /// Copy every provider-owned field from `incoming`, keeping internal
    /// identity and creation time.
    pub fn apply(&mut self, incoming: &Self) {
        self.email.clone_from(&incoming.email);
        self.name.clone_from(&incoming.name);
        self.phone.clone_from(&incoming.phone);
        self.description.clone_from(&incoming.description);
        self.address.clone_from(&incoming.address);
        self.shipping.clone_from(&incoming.shipping);
        self.tax_ids.clone_from(&incoming.tax_ids);
        self.preferred_locales.clone_from(&incoming.preferred_locales);
        self.metadata.clone_from(&incoming.metadata);
    }
}

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Address line 1.
    pub line1: Option<String>,
    /// Address line 2.
    pub line2: Option<String>,
    /// City or locality.
    pub city: Option<String>,
    /// State, county or province.
    pub state: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Two-letter ISO country code.
    pub country: Option<String>,
}

/// Shipping recipient and address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipping {
    /// Recipient name.
    pub name: Option<String>,
    /// Recipient phone.
    pub phone: Option<String>,
    /// Shipping address.
    pub address: Option<Address>,
}

/// A customer tax identifier (VAT number, EIN, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxId {
    /// Provider id of the tax id object.
    pub external_id: Option<String>,
    /// Kind of tax id, e.g. `eu_vat`.
    pub kind: String,
    /// The identifier itself.
    pub value: String,
    /// Country the id was issued in.
    pub country: Option<String>,
}

/// Many-to-many link between a customer and a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerWorkspace {
    /// The customer.
    pub customer_id: CustomerId,
    /// The workspace it is visible in.
    pub workspace_id: WorkspaceId,
    /// When the link was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SyncRecord;

    #[test]
    fn apply_keeps_identity() {
        let id = CustomerId::generate();
        let created = Utc::now();
        let mut existing = Customer {
            id: Some(id),
            email: Some("old@example.com".into()),
            created_at: Some(created),
            sync: ProviderSync::external("cus_1"),
            ..Customer::default()
        };
        let incoming = Customer {
            email: Some("new@example.com".into()),
            name: Some("New Name".into()),
            sync: ProviderSync::external("cus_1"),
            ..Customer::default()
        };

        existing.apply(&incoming);

        assert_eq!(existing.id, Some(id));
        assert_eq!(existing.created_at, Some(created));
        assert_eq!(existing.email.as_deref(), Some("new@example.com"));
        assert_eq!(existing.name.as_deref(), Some("New Name"));
        assert_eq!(existing.external_id(), "cus_1");
    }
}
