//! Stripe object ⇄ canonical record mapping.
//!
//! Each entity module has a `to_canonical` taking `Option<&T>`: an absent
//! Stripe object maps to the canonical zero value, never to an error. The
//! `to_params` side builds the form body for create calls.
//!
//! Amounts pass through untouched. Currencies are upper-cased on the way in
//! and lower-cased on the way out.

use chrono::{DateTime, Utc};

pub mod customer;
pub mod invoice;
pub mod price;
pub mod product;
pub mod subscription;
pub mod transaction;

/// Currency as stored canonically.
#[must_use]
pub fn canonical_currency(currency: &str) -> String {
    currency.to_uppercase()
}

/// Currency as Stripe expects it.
#[must_use]
pub fn provider_currency(currency: &str) -> String {
    currency.to_lowercase()
}

/// A Unix timestamp; zero means unset.
pub(crate) fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        None
    } else {
        DateTime::from_timestamp(secs, 0)
    }
}

pub(crate) fn opt_timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(timestamp)
}

/// `None` for an empty list.
pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
