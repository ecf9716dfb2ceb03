//! Stripe API types.
//!
//! Only the fields the mappers read are declared. Every field defaults so a
//! partially expanded or trimmed object still decodes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stripe metadata: string keys and values.
pub type StripeMetadata = HashMap<String, String>;

/// An object with a Stripe id.
pub trait StripeObject {
    /// The object id.
    fn id(&self) -> &str;
}

/// A field that is an id unless the request expanded it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    /// Not expanded.
    Id(String),
    /// Expanded.
    Object(Box<T>),
}

impl<T: StripeObject> Expandable<T> {
    /// The referenced id, expanded or not.
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(object) => object.id(),
        }
    }

    /// The expanded object, if any.
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Object(object) => Some(object),
        }
    }
}

/// Id of an expandable field whose object we never read.
pub fn expandable_id<T: StripeObject>(field: Option<&Expandable<T>>) -> Option<String> {
    field.map(|f| f.id().to_string()).filter(|id| !id.is_empty())
}

/// Any object reduced to its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObjectRef {
    /// Object id.
    #[serde(default)]
    pub id: String,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Object type (always "list").
    #[serde(default)]
    pub object: String,
    /// Data items.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
    /// URL for the list endpoint.
    #[serde(default)]
    pub url: Option<String>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self {
            object: "list".into(),
            data: Vec::new(),
            has_more: false,
            url: None,
        }
    }
}

/// Response of a DELETE call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeletedObject {
    /// Object id.
    #[serde(default)]
    pub id: String,
    /// Always true on success.
    #[serde(default)]
    pub deleted: bool,
}

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[allow(missing_docs)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Shipping details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[allow(missing_docs)]
pub struct Shipping {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

/// Customer tax id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaxId {
    /// Tax id object id.
    #[serde(default)]
    pub id: String,
    /// Kind, e.g. `eu_vat`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// The number.
    #[serde(default)]
    pub value: String,
    /// Issuing country.
    #[serde(default)]
    pub country: Option<String>,
}

/// Stripe customer object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    #[serde(default)]
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub name: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Billing address.
    #[serde(default)]
    pub address: Option<Address>,
    /// Shipping details.
    #[serde(default)]
    pub shipping: Option<Shipping>,
    /// Tax ids (requires `expand[]=tax_ids`).
    #[serde(default)]
    pub tax_ids: Option<StripeList<TaxId>>,
    /// Preferred locales.
    #[serde(default)]
    pub preferred_locales: Option<Vec<String>>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: StripeMetadata,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Set on deleted customers.
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe product object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Product {
    /// Product ID.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether it can be bought.
    #[serde(default)]
    pub active: bool,
    /// Image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Unit label.
    #[serde(default)]
    pub unit_label: Option<String>,
    /// Tax code.
    #[serde(default)]
    pub tax_code: Option<Expandable<ObjectRef>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: StripeMetadata,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Updated timestamp (Unix).
    #[serde(default)]
    pub updated: i64,
    /// Set on deleted products.
    #[serde(default)]
    pub deleted: bool,
}

/// Recurring component of a price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Recurring {
    /// `day`, `week`, `month` or `year`.
    #[serde(default)]
    pub interval: String,
    /// Intervals between charges.
    #[serde(default)]
    pub interval_count: i64,
}

/// Price tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[allow(missing_docs)]
pub struct PriceTier {
    #[serde(default)]
    pub up_to: Option<i64>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub flat_amount: Option<i64>,
}

/// Stripe price object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    /// Price ID.
    #[serde(default)]
    pub id: String,
    /// Owning product.
    #[serde(default)]
    pub product: Option<Expandable<Product>>,
    /// Whether it can be used for new purchases.
    #[serde(default)]
    pub active: bool,
    /// Amount in the minor unit; absent for tiered prices.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// Lower-case ISO currency.
    #[serde(default)]
    pub currency: String,
    /// `one_time` or `recurring`.
    #[serde(rename = "type", default)]
    pub price_type: String,
    /// Set on recurring prices.
    #[serde(default)]
    pub recurring: Option<Recurring>,
    /// Internal nickname.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Lookup key.
    #[serde(default)]
    pub lookup_key: Option<String>,
    /// Tiers (requires `expand[]=tiers`).
    #[serde(default)]
    pub tiers: Option<Vec<PriceTier>>,
    /// `volume` or `graduated`.
    #[serde(default)]
    pub tiers_mode: Option<String>,
    /// `exclusive`, `inclusive` or `unspecified`.
    #[serde(default)]
    pub tax_behavior: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: StripeMetadata,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Item of a subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    #[serde(default)]
    pub id: String,
    /// The price billed.
    #[serde(default)]
    pub price: Option<Expandable<Price>>,
    /// Quantity.
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Period start; newer API versions report periods per item.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Period end.
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Metadata.
    #[serde(default)]
    pub metadata: StripeMetadata,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct Subscription {
    /// Subscription ID.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer: Option<Expandable<Customer>>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub items: StripeList<SubscriptionItem>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub cancel_at: Option<i64>,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub trial_start: Option<i64>,
    #[serde(default)]
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub collection_method: Option<String>,
    #[serde(default)]
    pub default_tax_rates: Vec<Expandable<ObjectRef>>,
    #[serde(default)]
    pub metadata: StripeMetadata,
    #[serde(default)]
    pub created: i64,
}

/// Tax applied to an invoice or line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxAmount {
    /// Tax in the minor unit.
    #[serde(default)]
    pub amount: i64,
    /// The tax rate.
    #[serde(default)]
    pub tax_rate: Option<Expandable<ObjectRef>>,
    /// Amount the tax applied to.
    #[serde(default)]
    pub taxable_amount: Option<i64>,
    /// Whether the tax is included in the amount.
    #[serde(default)]
    pub inclusive: bool,
}

/// A start/end pair of Unix timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[allow(missing_docs)]
pub struct Period {
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
}

/// Invoice line.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct InvoiceLine {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub price: Option<Expandable<Price>>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub proration: bool,
    #[serde(default)]
    pub tax_amounts: Vec<TaxAmount>,
}

/// When an invoice changed status.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusTransitions {
    /// When it was paid.
    #[serde(default)]
    pub paid_at: Option<i64>,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct Invoice {
    /// Invoice ID.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer: Option<Expandable<Customer>>,
    #[serde(default)]
    pub subscription: Option<Expandable<Subscription>>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_remaining: i64,
    #[serde(default)]
    pub subtotal: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub tax: Option<i64>,
    #[serde(default)]
    pub total_tax_amounts: Vec<TaxAmount>,
    #[serde(default)]
    pub lines: StripeList<InvoiceLine>,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub invoice_pdf: Option<String>,
    #[serde(default)]
    pub period_start: Option<i64>,
    #[serde(default)]
    pub period_end: Option<i64>,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub status_transitions: Option<StatusTransitions>,
    #[serde(default)]
    pub metadata: StripeMetadata,
    #[serde(default)]
    pub created: i64,
}

/// The last failed payment attempt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentError {
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Stripe `PaymentIntent` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentIntent {
    /// Payment intent ID.
    #[serde(default)]
    pub id: String,
    /// Amount in cents.
    #[serde(default)]
    pub amount: i64,
    /// Currency (e.g., "usd").
    #[serde(default)]
    pub currency: String,
    /// Status (succeeded, processing, canceled, ...).
    #[serde(default)]
    pub status: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<Expandable<ObjectRef>>,
    /// Invoice ID.
    #[serde(default)]
    pub invoice: Option<Expandable<ObjectRef>>,
    /// Payment method ID.
    #[serde(default)]
    pub payment_method: Option<Expandable<ObjectRef>>,
    /// Last failed attempt.
    #[serde(default)]
    pub last_payment_error: Option<PaymentError>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Metadata.
    #[serde(default)]
    pub metadata: StripeMetadata,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Receipt email.
    #[serde(default)]
    pub receipt_email: Option<String>,
}

/// Stripe charge object.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct Charge {
    /// Charge ID.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub customer: Option<Expandable<ObjectRef>>,
    #[serde(default)]
    pub invoice: Option<Expandable<ObjectRef>>,
    #[serde(default)]
    pub payment_intent: Option<Expandable<ObjectRef>>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub receipt_email: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
    #[serde(default)]
    pub created: i64,
}

/// Stripe refund object.
#[derive(Debug, Clone, Default, Deserialize)]
#[allow(missing_docs)]
pub struct Refund {
    /// Refund ID.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub charge: Option<Expandable<ObjectRef>>,
    #[serde(default)]
    pub payment_intent: Option<Expandable<ObjectRef>>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
    #[serde(default)]
    pub created: i64,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "customer.updated").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: EventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Live or test mode.
    #[serde(default)]
    pub livemode: bool,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Parameter that caused the error.
    #[serde(default)]
    pub param: Option<String>,
}

macro_rules! impl_stripe_object {
    ($($ty:ty),* $(,)?) => {
        $(
            impl StripeObject for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_stripe_object!(ObjectRef, Customer, Product, Price, Subscription, Invoice);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expandable_accepts_id_or_object() {
        let price: Price = serde_json::from_value(json!({
            "id": "price_1",
            "product": "prod_1",
        }))
        .unwrap();
        assert_eq!(price.product.unwrap().id(), "prod_1");

        let price: Price = serde_json::from_value(json!({
            "id": "price_2",
            "product": {"id": "prod_2", "name": "Pro", "active": true},
        }))
        .unwrap();
        let product = price.product.unwrap();
        assert_eq!(product.id(), "prod_2");
        assert_eq!(product.as_object().unwrap().name, "Pro");
    }

    #[test]
    fn list_decodes() {
        let list: StripeList<Customer> = serde_json::from_value(json!({
            "object": "list",
            "data": [{"id": "cus_1"}, {"id": "cus_2", "email": "a@b.c"}],
            "has_more": true,
            "url": "/v1/customers",
        }))
        .unwrap();
        assert_eq!(list.data.len(), 2);
        assert!(list.has_more);
        assert_eq!(list.data[1].email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn null_fields_decode() {
        let sub: Subscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "canceled_at": null,
            "items": {"object": "list", "data": [], "has_more": false},
        }))
        .unwrap();
        assert!(sub.canceled_at.is_none());
        assert_eq!(expandable_id(sub.customer.as_ref()).as_deref(), Some("cus_1"));
    }
}
