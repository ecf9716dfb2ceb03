//! Invoice records.
//!
//! Amounts on invoices are passed through from the provider untouched.
//! `amount_paid + amount_remaining` does not always equal `amount_due`
//! (credit notes and partial credits exist), so nothing here recomputes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{impl_sync_record, EntityType};
use crate::ids::{CustomerId, InvoiceId, SubscriptionId, WorkspaceId};
use crate::sync::{Metadata, ProviderSync};

/// Invoice status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Editable draft.
    #[default]
    Draft,
    /// Finalized, awaiting payment.
    Open,
    /// Paid.
    Paid,
    /// Deemed uncollectible.
    Uncollectible,
    /// Voided.
    Void,
}

impl InvoiceStatus {
    /// Parse a provider status string. Unknown values map to `Draft`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "open" => Self::Open,
            "paid" => Self::Paid,
            "uncollectible" => Self::Uncollectible,
            "void" => Self::Void,
            _ => Self::Draft,
        }
    }
}

/// A tax line on an invoice or invoice line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxAmount {
    /// Tax amount in minor units.
    pub amount: i64,
    /// Provider id of the tax rate.
    pub rate_id: String,
    /// Amount the tax was computed on.
    pub taxable_amount: Option<i64>,
    /// Whether the tax is included in the line amount.
    pub inclusive: bool,
}

/// One line of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Provider id of the line.
    pub external_id: String,
    /// Description shown on the invoice.
    pub description: Option<String>,
    /// Line amount in minor units.
    pub amount: i64,
    /// Upper-case ISO currency code.
    pub currency: String,
    /// Quantity billed.
    pub quantity: Option<i64>,
    /// Provider id of the price, when the price was expanded or referenced.
    pub external_price_id: Option<String>,
    /// Billed period start.
    pub period_start: Option<DateTime<Utc>>,
    /// Billed period end.
    pub period_end: Option<DateTime<Utc>>,
    /// Whether the line is a proration.
    pub proration: bool,
    /// Tax lines; `None` when the provider sent none.
    pub tax_amounts: Option<Vec<TaxAmount>>,
}

/// An invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Internal id, assigned by the store.
    pub id: Option<InvoiceId>,

    /// Internal customer id, resolved at reconciliation.
    pub customer_id: Option<CustomerId>,

    /// Provider id of the customer.
    pub external_customer_id: String,

    /// Internal subscription id, resolved at reconciliation when present.
    pub subscription_id: Option<SubscriptionId>,

    /// Provider id of the subscription, if the invoice belongs to one.
    pub external_subscription_id: Option<String>,

    /// Owning workspace, assigned from the sync context.
    pub workspace_id: Option<WorkspaceId>,

    /// Invoice number.
    pub number: Option<String>,

    /// Status.
    pub status: InvoiceStatus,

    /// Upper-case ISO currency code.
    pub currency: String,

    /// Amount due.
    pub amount_due: i64,

    /// Amount paid.
    pub amount_paid: i64,

    /// Amount remaining.
    pub amount_remaining: i64,

    /// Total before discounts and taxes.
    pub subtotal: i64,

    /// Total after discounts and taxes.
    pub total: i64,

    /// Total tax, if the provider computed it.
    pub tax: Option<i64>,

    /// Invoice-level tax lines; `None` when the provider sent none.
    pub tax_amounts: Option<Vec<TaxAmount>>,

    /// Ordered line items.
    pub lines: Vec<InvoiceLineItem>,

    /// Hosted payment page.
    pub hosted_invoice_url: Option<String>,

    /// PDF download link.
    pub invoice_pdf: Option<String>,

    /// Period start.
    pub period_start: Option<DateTime<Utc>>,

    /// Period end.
    pub period_end: Option<DateTime<Utc>>,

    /// Due date.
    pub due_date: Option<DateTime<Utc>>,

    /// When the invoice was paid.
    pub paid_at: Option<DateTime<Utc>>,

    /// Arbitrary key/value metadata.
    pub metadata: Metadata,

    /// Provider bookkeeping.
    pub sync: ProviderSync,

    /// When the provider created the invoice.
    pub created_at: Option<DateTime<Utc>>,

    /// When the internal record was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

impl_sync_record!(Invoice, EntityType::Invoices);

impl Invoice {
    /// Copy provider-owned fields from `incoming`. Customer, subscription and
    /// workspace links are left alone.
    pub fn apply(&mut self, incoming: &Self) {
        self.number.clone_from(&incoming.number);
        self.status = incoming.status;
        self.currency.clone_from(&incoming.currency);
        self.amount_due = incoming.amount_due;
        self.amount_paid = incoming.amount_paid;
        self.amount_remaining = incoming.amount_remaining;
        self.subtotal = incoming.subtotal;
        self.total = incoming.total;
        self.tax = incoming.tax;
        self.tax_amounts.clone_from(&incoming.tax_amounts);
        self.lines.clone_from(&incoming.lines);
        self.hosted_invoice_url.clone_from(&incoming.hosted_invoice_url);
        self.invoice_pdf.clone_from(&incoming.invoice_pdf);
        self.period_start = incoming.period_start;
        self.period_end = incoming.period_end;
        self.due_date = incoming.due_date;
        self.paid_at = incoming.paid_at;
        self.metadata.clone_from(&incoming.metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_passes_amounts_through() {
        let mut existing = Invoice::default();
        let incoming = Invoice {
            amount_due: 1000,
            amount_paid: 300,
            amount_remaining: 500,
            ..Invoice::default()
        };
        existing.apply(&incoming);
        assert_eq!(existing.amount_due, 1000);
        assert_eq!(existing.amount_paid, 300);
        assert_eq!(existing.amount_remaining, 500);
    }

    #[test]
    fn status_parse() {
        assert_eq!(InvoiceStatus::parse("paid"), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::parse(""), InvoiceStatus::Draft);
    }
}
