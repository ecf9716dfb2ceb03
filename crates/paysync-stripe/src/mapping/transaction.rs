//! Transactions: payment intents, charges and refunds.
//!
//! All three Stripe objects land in the same canonical record. The
//! `external_parent_id` links a charge to its payment intent and a refund to
//! its charge.

use paysync_core::{ProviderSync, Transaction, TransactionStatus, TransactionType};

use super::{canonical_currency, provider_currency, timestamp};
use crate::params::FormParams;
use crate::types::{self, expandable_id};

/// Map a payment intent.
#[must_use]
pub fn from_payment_intent(intent: Option<&types::PaymentIntent>) -> Transaction {
    let Some(pi) = intent else {
        return Transaction::default();
    };

    Transaction {
        id: None,
        transaction_type: TransactionType::PaymentIntent,
        customer_id: None,
        external_customer_id: expandable_id(pi.customer.as_ref()),
        workspace_id: None,
        external_invoice_id: expandable_id(pi.invoice.as_ref()),
        external_parent_id: None,
        amount: pi.amount,
        amount_refunded: 0,
        currency: canonical_currency(&pi.currency),
        status: TransactionStatus::parse(&pi.status),
        provider_status: pi.status.clone(),
        description: pi.description.clone(),
        payment_method: expandable_id(pi.payment_method.as_ref()),
        failure_message: pi
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone()),
        receipt_email: pi.receipt_email.clone(),
        metadata: pi.metadata.clone(),
        sync: ProviderSync::external(&pi.id),
        created_at: timestamp(pi.created),
        updated_at: None,
    }
}

/// Map a charge.
#[must_use]
pub fn from_charge(charge: Option<&types::Charge>) -> Transaction {
    let Some(ch) = charge else {
        return Transaction::default();
    };

    Transaction {
        id: None,
        transaction_type: TransactionType::Charge,
        customer_id: None,
        external_customer_id: expandable_id(ch.customer.as_ref()),
        workspace_id: None,
        external_invoice_id: expandable_id(ch.invoice.as_ref()),
        external_parent_id: expandable_id(ch.payment_intent.as_ref()),
        amount: ch.amount,
        amount_refunded: ch.amount_refunded,
        currency: canonical_currency(&ch.currency),
        status: TransactionStatus::parse(&ch.status),
        provider_status: ch.status.clone(),
        description: ch.description.clone(),
        payment_method: ch.payment_method.clone().filter(|m| !m.is_empty()),
        failure_message: ch.failure_message.clone(),
        receipt_email: ch.receipt_email.clone(),
        metadata: ch.metadata.clone(),
        sync: ProviderSync::external(&ch.id),
        created_at: timestamp(ch.created),
        updated_at: None,
    }
}

/// Map a refund. The refunded amount equals the refund amount once it
/// succeeded.
#[must_use]
pub fn from_refund(refund: Option<&types::Refund>) -> Transaction {
    let Some(re) = refund else {
        return Transaction::default();
    };

    let provider_status = re.status.clone().unwrap_or_default();
    let status = TransactionStatus::parse(&provider_status);

    Transaction {
        id: None,
        transaction_type: TransactionType::Refund,
        customer_id: None,
        external_customer_id: None,
        workspace_id: None,
        external_invoice_id: None,
        external_parent_id: expandable_id(re.charge.as_ref())
            .or_else(|| expandable_id(re.payment_intent.as_ref())),
        amount: re.amount,
        amount_refunded: if status == TransactionStatus::Succeeded {
            re.amount
        } else {
            0
        },
        currency: canonical_currency(&re.currency),
        status,
        provider_status,
        description: re.reason.clone(),
        payment_method: None,
        failure_message: re.failure_reason.clone(),
        receipt_email: None,
        metadata: re.metadata.clone(),
        sync: ProviderSync::external(&re.id),
        created_at: timestamp(re.created),
        updated_at: None,
    }
}

/// Stripe resource path for a transaction type.
#[must_use]
pub const fn resource(transaction_type: TransactionType) -> &'static str {
    match transaction_type {
        TransactionType::PaymentIntent => "/payment_intents",
        TransactionType::Charge => "/charges",
        TransactionType::Refund => "/refunds",
    }
}

/// Transaction type of a Stripe id, by prefix.
#[must_use]
pub fn type_of_id(id: &str) -> Option<TransactionType> {
    if id.starts_with("pi_") {
        Some(TransactionType::PaymentIntent)
    } else if id.starts_with("ch_") || id.starts_with("py_") {
        Some(TransactionType::Charge)
    } else if id.starts_with("re_") || id.starts_with("pyr_") {
        Some(TransactionType::Refund)
    } else {
        None
    }
}

/// Form body for creating a transaction of its type.
#[must_use]
pub fn to_params(tx: &Transaction) -> FormParams {
    let mut form = FormParams::new();
    match tx.transaction_type {
        TransactionType::PaymentIntent | TransactionType::Charge => {
            form.push("amount", tx.amount);
            form.push("currency", provider_currency(&tx.currency));
            form.push_opt("customer", tx.external_customer_id.as_deref());
            form.push_opt("description", tx.description.as_deref());
            form.push_opt("receipt_email", tx.receipt_email.as_deref());
            let method_key = if tx.transaction_type == TransactionType::Charge {
                "source"
            } else {
                "payment_method"
            };
            form.push_opt(method_key, tx.payment_method.as_deref());
        }
        TransactionType::Refund => {
            if let Some(parent) = tx.external_parent_id.as_deref() {
                let key = if parent.starts_with("pi_") {
                    "payment_intent"
                } else {
                    "charge"
                };
                form.push(key, parent);
            }
            if tx.amount > 0 {
                form.push("amount", tx.amount);
            }
            form.push_opt("reason", tx.description.as_deref());
        }
    }
    form.metadata(&tx.metadata);
    form
}

/// Form body for updating a transaction. Refunds only take metadata.
#[must_use]
pub fn to_update_params(tx: &Transaction) -> FormParams {
    let mut form = FormParams::new();
    if tx.transaction_type != TransactionType::Refund {
        form.push_opt("description", tx.description.as_deref());
        form.push_opt("receipt_email", tx.receipt_email.as_deref());
    }
    form.metadata(&tx.metadata);
    form
}
