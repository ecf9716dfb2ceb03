//! Price records and the recurring/one-time invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{impl_sync_record, EntityType};
use crate::error::{BillingError, Result};
use crate::ids::{PriceId, ProductId, WorkspaceId};
use crate::sync::{Metadata, ProviderSync};

/// Whether a price bills once or on a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// Charged once.
    #[default]
    OneTime,
    /// Charged every interval.
    Recurring,
}

/// Billing interval unit for recurring prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    /// Daily.
    Day,
    /// Weekly.
    Week,
    /// Monthly.
    Month,
    /// Yearly.
    Year,
}

impl IntervalType {
    /// The lower-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Parse a wire name, `None` for anything unknown.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// How tiers combine for tiered prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiersMode {
    /// The tier the total quantity falls in prices all units.
    Volume,
    /// Each tier prices the units that fall in it.
    Graduated,
}

/// Whether tax is included in the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxBehavior {
    /// Tax is added on top.
    Exclusive,
    /// Tax is included.
    Inclusive,
    /// Not decided yet.
    Unspecified,
}

/// One tier of a tiered price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    /// Upper bound of the tier; `None` means infinity.
    pub up_to: Option<i64>,
    /// Per-unit amount in minor units.
    pub unit_amount: Option<i64>,
    /// Flat amount for the tier in minor units.
    pub flat_amount: Option<i64>,
}

/// A price for a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Internal id, assigned by the store.
    pub id: Option<PriceId>,

    /// Internal id of the owning product, resolved at reconciliation.
    pub product_id: Option<ProductId>,

    /// Provider id of the owning product.
    pub external_product_id: String,

    /// Workspace of the owning product.
    pub workspace_id: Option<WorkspaceId>,

    /// Whether the price can be used for new purchases.
    pub active: bool,

    /// Amount in minor units. Zero for purely tiered prices.
    pub amount: i64,

    /// Upper-case ISO currency code.
    pub currency: String,

    /// Recurring or one-time.
    pub price_type: PriceType,

    /// Interval unit; present iff recurring.
    pub interval_type: Option<IntervalType>,

    /// Number of interval units between charges; present iff recurring.
    pub interval_count: Option<i32>,

    /// Number of billing periods the commitment runs for; present iff recurring.
    pub term_length: Option<i32>,

    /// Display nickname.
    pub nickname: Option<String>,

    /// Lookup key.
    pub lookup_key: Option<String>,

    /// Tier definitions for tiered prices.
    pub tiers: Option<Vec<PriceTier>>,

    /// How the tiers combine.
    pub tiers_mode: Option<TiersMode>,

    /// Tax behavior.
    pub tax_behavior: Option<TaxBehavior>,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,

    /// Provider bookkeeping.
    pub sync: ProviderSync,

    /// When the provider created the price.
    pub created_at: Option<DateTime<Utc>>,

    /// When the internal record was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Price, EntityType::Prices);

impl Price {
    /// Check the recurring/one-time field rules.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidPrice` if a recurring price lacks its
    /// interval or a positive term, or a one-time price carries any of them.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| BillingError::InvalidPrice {
            external_id: self.sync.external_id.clone(),
            reason: reason.to_string(),
        };

        match self.price_type {
            PriceType::Recurring => {
                if self.interval_type.is_none() {
                    return Err(invalid("recurring price without interval type"));
                }
                if !self.interval_count.is_some_and(|c| c > 0) {
                    return Err(invalid("recurring price needs interval count > 0"));
                }
                if !self.term_length.is_some_and(|t| t > 0) {
                    return Err(invalid("recurring price needs term length > 0"));
                }
            }
            PriceType::OneTime => {
                if self.interval_type.is_some()
                    || self.interval_count.is_some()
                    || self.term_length.is_some()
                {
                    return Err(invalid("one-time price must not carry interval or term"));
                }
            }
        }
        Ok(())
    }

    /// Copy provider-owned fields from `incoming`. The owning product is not
    /// changed here.
    pub fn apply(&mut self, incoming: &Self) {
        self.active = incoming.active;
        self.amount = incoming.amount;
        self.currency.clone_from(&incoming.currency);
        self.price_type = incoming.price_type;
        self.interval_type = incoming.interval_type;
        self.interval_count = incoming.interval_count;
        self.term_length = incoming.term_length;
        self.nickname.clone_from(&incoming.nickname);
        self.lookup_key.clone_from(&incoming.lookup_key);
        self.tiers.clone_from(&incoming.tiers);
        self.tiers_mode = incoming.tiers_mode;
        self.tax_behavior = incoming.tax_behavior;
        self.metadata.clone_from(&incoming.metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recurring() -> Price {
        Price {
            price_type: PriceType::Recurring,
            interval_type: Some(IntervalType::Month),
            interval_count: Some(1),
            term_length: Some(12),
            sync: ProviderSync::external("price_1"),
            ..Price::default()
        }
    }

    #[test]
    fn zero_value_is_a_valid_one_time_price() {
        assert!(Price::default().validate().is_ok());
    }

    #[test]
    fn recurring_requires_interval_and_term() {
        assert!(recurring().validate().is_ok());

        let mut p = recurring();
        p.interval_type = None;
        assert!(matches!(p.validate(), Err(BillingError::InvalidPrice { .. })));

        let mut p = recurring();
        p.term_length = Some(0);
        assert!(p.validate().is_err());

        let mut p = recurring();
        p.interval_count = None;
        assert!(p.validate().is_err());
    }

    #[test]
    fn one_time_rejects_interval_fields() {
        let p = Price {
            term_length: Some(1),
            ..Price::default()
        };
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("one-time"));
    }

    #[test]
    fn interval_names_roundtrip() {
        for i in [
            IntervalType::Day,
            IntervalType::Week,
            IntervalType::Month,
            IntervalType::Year,
        ] {
            assert_eq!(IntervalType::parse(i.as_str()), Some(i));
        }
        assert_eq!(IntervalType::parse("fortnight"), None);
    }
}
