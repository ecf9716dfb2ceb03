//! Invoices.

use paysync_core::{Invoice, InvoiceLineItem, InvoiceStatus, ProviderSync, TaxAmount};

use super::{canonical_currency, non_empty, opt_timestamp, timestamp};
use crate::params::FormParams;
use crate::types::{self, expandable_id};

/// Map a Stripe invoice. Amounts are copied as sent.
#[must_use]
pub fn to_canonical(invoice: Option<&types::Invoice>) -> Invoice {
    let Some(inv) = invoice else {
        return Invoice::default();
    };

    Invoice {
        id: None,
        customer_id: None,
        external_customer_id: expandable_id(inv.customer.as_ref()).unwrap_or_default(),
        subscription_id: None,
        external_subscription_id: expandable_id(inv.subscription.as_ref()),
        workspace_id: None,
        number: inv.number.clone(),
        status: inv
            .status
            .as_deref()
            .map(InvoiceStatus::parse)
            .unwrap_or_default(),
        currency: canonical_currency(&inv.currency),
        amount_due: inv.amount_due,
        amount_paid: inv.amount_paid,
        amount_remaining: inv.amount_remaining,
        subtotal: inv.subtotal,
        total: inv.total,
        tax: inv.tax,
        tax_amounts: tax_amounts(&inv.total_tax_amounts),
        lines: inv.lines.data.iter().map(line).collect(),
        hosted_invoice_url: inv.hosted_invoice_url.clone(),
        invoice_pdf: inv.invoice_pdf.clone(),
        period_start: opt_timestamp(inv.period_start),
        period_end: opt_timestamp(inv.period_end),
        due_date: opt_timestamp(inv.due_date),
        paid_at: inv.status_transitions.and_then(|t| opt_timestamp(t.paid_at)),
        metadata: inv.metadata.clone(),
        sync: ProviderSync::external(&inv.id),
        created_at: timestamp(inv.created),
        updated_at: None,
    }
}

fn line(l: &types::InvoiceLine) -> InvoiceLineItem {
    InvoiceLineItem {
        external_id: l.id.clone(),
        description: l.description.clone(),
        amount: l.amount,
        currency: canonical_currency(&l.currency),
        quantity: l.quantity,
        external_price_id: expandable_id(l.price.as_ref()),
        period_start: l.period.and_then(|p| timestamp(p.start)),
        period_end: l.period.and_then(|p| timestamp(p.end)),
        proration: l.proration,
        tax_amounts: tax_amounts(&l.tax_amounts),
    }
}

fn tax_amounts(amounts: &[types::TaxAmount]) -> Option<Vec<TaxAmount>> {
    non_empty(
        amounts
            .iter()
            .map(|t| TaxAmount {
                amount: t.amount,
                rate_id: expandable_id(t.tax_rate.as_ref()).unwrap_or_default(),
                taxable_amount: t.taxable_amount,
                inclusive: t.inclusive,
            })
            .collect(),
    )
}

/// Form body for creating a draft invoice.
#[must_use]
pub fn to_params(invoice: &Invoice) -> FormParams {
    let mut form = FormParams::new();
    form.push("customer", &invoice.external_customer_id);
    form.push_opt("subscription", invoice.external_subscription_id.as_deref());
    if !invoice.currency.is_empty() {
        form.push("currency", super::provider_currency(&invoice.currency));
    }
    form.push_opt("due_date", invoice.due_date.map(|t| t.timestamp()));
    form.metadata(&invoice.metadata);
    form
}

/// Form body for updating an invoice.
#[must_use]
pub fn to_update_params(invoice: &Invoice) -> FormParams {
    let mut form = FormParams::new();
    form.push_opt("due_date", invoice.due_date.map(|t| t.timestamp()));
    form.metadata(&invoice.metadata);
    form
}
