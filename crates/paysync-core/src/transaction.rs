//! Transaction records (payment intents, charges, refunds).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{impl_sync_record, EntityType};
use crate::ids::{CustomerId, TransactionId, WorkspaceId};
use crate::sync::{Metadata, ProviderSync};

/// Which provider-native object a transaction was derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// A payment intent.
    #[default]
    PaymentIntent,
    /// A charge.
    Charge,
    /// A refund.
    Refund,
}

impl TransactionType {
    /// The wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaymentIntent => "payment_intent",
            Self::Charge => "charge",
            Self::Refund => "refund",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_intent" => Some(Self::PaymentIntent),
            "charge" => Some(Self::Charge),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }
}

/// Normalized transaction status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, nothing happened yet.
    #[default]
    Pending,
    /// Waiting for the customer (payment method, 3DS, confirmation).
    RequiresAction,
    /// Being processed.
    Processing,
    /// Funds captured or refunded.
    Succeeded,
    /// Failed.
    Failed,
    /// Canceled before completion.
    Canceled,
}

impl TransactionStatus {
    /// Normalize a provider status string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "requires_payment_method" | "requires_confirmation" | "requires_action"
            | "requires_capture" => Self::RequiresAction,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" => Self::Canceled,
            _ => Self::Pending,
        }
    }
}

/// A money movement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Internal id, assigned by the store.
    pub id: Option<TransactionId>,

    /// Which provider object this came from.
    pub transaction_type: TransactionType,

    /// Internal customer id, resolved at reconciliation when known.
    pub customer_id: Option<CustomerId>,

    /// Provider id of the customer.
    pub external_customer_id: Option<String>,

    /// Workspace the transaction was synced into.
    pub workspace_id: Option<WorkspaceId>,

    /// Provider id of the invoice this pays, if any.
    pub external_invoice_id: Option<String>,

    /// Provider id of the parent object: the payment intent of a charge, the
    /// charge of a refund.
    pub external_parent_id: Option<String>,

    /// Amount in minor units.
    pub amount: i64,

    /// Amount refunded so far, in minor units.
    pub amount_refunded: i64,

    /// Upper-case ISO currency code.
    pub currency: String,

    /// Normalized status.
    pub status: TransactionStatus,

    /// Status exactly as the provider reported it.
    pub provider_status: String,

    /// Description.
    pub description: Option<String>,

    /// Provider id of the payment method.
    pub payment_method: Option<String>,

    /// Failure reason.
    pub failure_message: Option<String>,

    /// Receipt email.
    pub receipt_email: Option<String>,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,

    /// Provider bookkeeping.
    pub sync: ProviderSync,

    /// When the provider created the object.
    pub created_at: Option<DateTime<Utc>>,

    /// When the internal record was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Transaction, EntityType::Transactions);

impl Transaction {
    /// Copy provider-owned fields from `incoming`.
    pub fn apply(&mut self, incoming: &Self) {
        self.transaction_type = incoming.transaction_type;
        self.external_customer_id.clone_from(&incoming.external_customer_id);
        self.external_invoice_id.clone_from(&incoming.external_invoice_id);
        self.external_parent_id.clone_from(&incoming.external_parent_id);
        self.amount = incoming.amount;
        self.amount_refunded = incoming.amount_refunded;
        self.currency.clone_from(&incoming.currency);
        self.status = incoming.status;
        self.provider_status.clone_from(&incoming.provider_status);
        self.description.clone_from(&incoming.description);
        self.payment_method.clone_from(&incoming.payment_method);
        self.failure_message.clone_from(&incoming.failure_message);
        self.receipt_email.clone_from(&incoming.receipt_email);
        self.metadata.clone_from(&incoming.metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_normalization() {
        assert_eq!(
            TransactionStatus::parse("requires_payment_method"),
            TransactionStatus::RequiresAction
        );
        assert_eq!(TransactionStatus::parse("succeeded"), TransactionStatus::Succeeded);
        assert_eq!(TransactionStatus::parse("pending"), TransactionStatus::Pending);
    }

    #[test]
    fn type_names() {
        assert_eq!(TransactionType::parse("refund"), Some(TransactionType::Refund));
        assert_eq!(TransactionType::Charge.as_str(), "charge");
        assert_eq!(TransactionType::parse("transfer"), None);
    }
}
