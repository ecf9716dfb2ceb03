//! Entity kinds and the trait every synced record implements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::sync::ProviderSync;

/// The kinds of entity the engine can synchronize.
///
/// The declaration order is the dependency order: a kind may only reference
/// kinds declared before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Customers.
    Customers,
    /// Products.
    Products,
    /// Prices (require products).
    Prices,
    /// Subscriptions (require customers and prices).
    Subscriptions,
    /// Invoices (require customers, optionally subscriptions).
    Invoices,
    /// Payment intents, charges and refunds.
    Transactions,
}

impl EntityType {
    /// Entity types synced when a config names none.
    pub const DEFAULT_SYNC_ORDER: [Self; 4] = [
        Self::Customers,
        Self::Products,
        Self::Prices,
        Self::Subscriptions,
    ];

    /// The wire name (`customers`, `products`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Prices => "prices",
            Self::Subscriptions => "subscriptions",
            Self::Invoices => "invoices",
            Self::Transactions => "transactions",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customers" => Ok(Self::Customers),
            "products" => Ok(Self::Products),
            "prices" => Ok(Self::Prices),
            "subscriptions" => Ok(Self::Subscriptions),
            "invoices" => Ok(Self::Invoices),
            "transactions" => Ok(Self::Transactions),
            other => Err(BillingError::UnknownEntityType(other.to_string())),
        }
    }
}

/// A canonical record linked to a provider object.
pub trait SyncRecord {
    /// The entity kind.
    const ENTITY_TYPE: EntityType;

    /// Provider bookkeeping.
    fn sync(&self) -> &ProviderSync;

    /// Mutable provider bookkeeping.
    fn sync_mut(&mut self) -> &mut ProviderSync;

    /// The provider's identifier.
    fn external_id(&self) -> &str {
        &self.sync().external_id
    }
}

/// Implements [`SyncRecord`] for a struct with a `sync: ProviderSync` field.
macro_rules! impl_sync_record {
    ($ty:ty, $kind:expr) => {
        impl $crate::entity::SyncRecord for $ty {
            const ENTITY_TYPE: $crate::entity::EntityType = $kind;

            fn sync(&self) -> &$crate::sync::ProviderSync {
                &self.sync
            }

            fn sync_mut(&mut self) -> &mut $crate::sync::ProviderSync {
                &mut self.sync
            }
        }
    };
}

pub(crate) use impl_sync_record;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        for kind in [
            EntityType::Customers,
            EntityType::Products,
            EntityType::Prices,
            EntityType::Subscriptions,
            EntityType::Invoices,
            EntityType::Transactions,
        ] {
            assert_eq!(kind.as_str().parse::<EntityType>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "coupons".parse::<EntityType>().unwrap_err();
        assert_eq!(err, BillingError::UnknownEntityType("coupons".into()));
    }

    #[test]
    fn default_order_follows_dependencies() {
        let order = EntityType::DEFAULT_SYNC_ORDER;
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }
}
