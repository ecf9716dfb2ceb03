//! Canonical webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::ids::WebhookEventId;
use crate::{Customer, Invoice, Price, Product, Subscription, Transaction};

/// The canonical payload of a webhook event.
///
/// Known provider objects are mapped into their canonical type; anything else
/// is kept as the decoded JSON so new provider event types never break
/// ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "object", rename_all = "snake_case")]
pub enum WebhookData {
    /// A customer.
    Customer(Customer),
    /// A product.
    Product(Product),
    /// A price.
    Price(Price),
    /// A subscription.
    Subscription(Subscription),
    /// An invoice.
    Invoice(Invoice),
    /// A payment intent, charge or refund.
    Transaction(Transaction),
    /// An event type without a registered mapper.
    Unrecognized(serde_json::Value),
}

impl WebhookData {
    /// The entity kind carried, `None` for unrecognized payloads.
    #[must_use]
    pub fn entity_type(&self) -> Option<EntityType> {
        match self {
            Self::Customer(_) => Some(EntityType::Customers),
            Self::Product(_) => Some(EntityType::Products),
            Self::Price(_) => Some(EntityType::Prices),
            Self::Subscription(_) => Some(EntityType::Subscriptions),
            Self::Invoice(_) => Some(EntityType::Invoices),
            Self::Transaction(_) => Some(EntityType::Transactions),
            Self::Unrecognized(_) => None,
        }
    }
}

/// A provider-pushed notification, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Internal id, assigned when the event is stored.
    pub id: Option<WebhookEventId>,

    /// Provider that sent the event.
    pub provider: String,

    /// The provider's event id; unique per provider.
    pub provider_event_id: String,

    /// Provider event type, e.g. `customer.updated`.
    pub event_type: String,

    /// Request body exactly as received.
    pub raw_data: Vec<u8>,

    /// Whether the signature header verified against the body.
    pub signature_valid: bool,

    /// Mapped payload. `None` until the event has been verified and parsed.
    pub data: Option<WebhookData>,

    /// Whether the provider sent it from live mode.
    pub livemode: bool,

    /// When the provider created the event.
    pub created_at: Option<DateTime<Utc>>,

    /// When the event was received.
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// An event that failed signature verification. Only the raw body is kept.
    #[must_use]
    pub fn unverified(provider: impl Into<String>, raw_data: &[u8]) -> Self {
        Self {
            id: None,
            provider: provider.into(),
            provider_event_id: String::new(),
            event_type: String::new(),
            raw_data: raw_data.to_vec(),
            signature_valid: false,
            data: None,
            livemode: false,
            created_at: None,
            received_at: Utc::now(),
        }
    }

    /// Whether the event announces a deletion (`*.deleted`).
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.event_type.ends_with(".deleted")
    }
}
