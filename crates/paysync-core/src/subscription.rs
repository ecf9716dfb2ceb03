//! Subscription records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{impl_sync_record, EntityType};
use crate::error::{BillingError, Result};
use crate::ids::{CustomerId, PriceId, SubscriptionId, WorkspaceId};
use crate::sync::{Metadata, ProviderSync};

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// First payment has not succeeded yet.
    #[default]
    Incomplete,
    /// First payment never succeeded; terminal.
    IncompleteExpired,
    /// In a trial period.
    Trialing,
    /// Paid and current.
    Active,
    /// Latest renewal payment failed.
    PastDue,
    /// Canceled; terminal.
    Canceled,
    /// Retries exhausted without payment.
    Unpaid,
    /// Collection paused.
    Paused,
}

impl SubscriptionStatus {
    /// Parse a provider status string. Unknown values map to `Incomplete`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => Self::Incomplete,
        }
    }
}

/// One price line of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    /// Provider id of the item (`si_...`).
    pub external_id: String,

    /// Internal price id, resolved at reconciliation.
    pub price_id: Option<PriceId>,

    /// Provider id of the price.
    pub external_price_id: String,

    /// Units subscribed.
    pub quantity: i64,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,
}

/// A customer's subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Internal id, assigned by the store.
    pub id: Option<SubscriptionId>,

    /// Internal customer id, resolved at reconciliation.
    pub customer_id: Option<CustomerId>,

    /// Provider id of the customer.
    pub external_customer_id: String,

    /// Owning workspace, assigned from the sync context.
    pub workspace_id: Option<WorkspaceId>,

    /// Lifecycle status.
    pub status: SubscriptionStatus,

    /// Price lines.
    pub items: Vec<SubscriptionItem>,

    /// Start of the current billing period.
    pub current_period_start: Option<DateTime<Utc>>,

    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,

    /// Cancel when the current period ends. Scheduling only; see
    /// [`Subscription::is_terminated`].
    pub cancel_at_period_end: bool,

    /// Scheduled cancellation time.
    pub cancel_at: Option<DateTime<Utc>>,

    /// When the subscription was canceled.
    pub canceled_at: Option<DateTime<Utc>>,

    /// When the subscription ended.
    pub ended_at: Option<DateTime<Utc>>,

    /// Trial start.
    pub trial_start: Option<DateTime<Utc>>,

    /// Trial end.
    pub trial_end: Option<DateTime<Utc>>,

    /// `charge_automatically` or `send_invoice`.
    pub collection_method: Option<String>,

    /// Provider ids of default tax rates.
    pub default_tax_rates: Vec<String>,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,

    /// Provider bookkeeping.
    pub sync: ProviderSync,

    /// When the provider created the subscription.
    pub created_at: Option<DateTime<Utc>>,

    /// When the internal record was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Subscription, EntityType::Subscriptions);

impl Subscription {
    /// Whether the subscription has actually ended.
    ///
    /// `cancel_at_period_end` alone does not terminate anything.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.canceled_at.is_some() || self.ended_at.is_some()
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidSubscription` if there are no items or
    /// the current period ends before it starts.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| BillingError::InvalidSubscription {
            external_id: self.sync.external_id.clone(),
            reason: reason.to_string(),
        };

        if self.items.is_empty() {
            return Err(invalid("subscription has no items"));
        }
        if let (Some(start), Some(end)) = (self.current_period_start, self.current_period_end) {
            if start > end {
                return Err(invalid("current period ends before it starts"));
            }
        }
        Ok(())
    }

    /// Copy provider-owned fields from `incoming`. Customer and workspace
    /// links are left alone.
    pub fn apply(&mut self, incoming: &Self) {
        self.status = incoming.status;
        self.items.clone_from(&incoming.items);
        self.current_period_start = incoming.current_period_start;
        self.current_period_end = incoming.current_period_end;
        self.cancel_at_period_end = incoming.cancel_at_period_end;
        self.cancel_at = incoming.cancel_at;
        self.canceled_at = incoming.canceled_at;
        self.ended_at = incoming.ended_at;
        self.trial_start = incoming.trial_start;
        self.trial_end = incoming.trial_end;
        self.collection_method.clone_from(&incoming.collection_method);
        self.default_tax_rates.clone_from(&incoming.default_tax_rates);
        self.metadata.clone_from(&incoming.metadata);
    }
}
