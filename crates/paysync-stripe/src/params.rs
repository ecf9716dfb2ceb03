//! Form-encoded request parameters and declared expansions.

use std::collections::HashMap;

use paysync_core::{Address, ListParams};

/// Nested expansions each read operation requests.
///
/// A field that is not listed here stays an id, and the canonical field it
/// would fill keeps its zero value.
pub mod expand {
    /// Customers: tax ids.
    pub const CUSTOMER: &[&str] = &["tax_ids"];
    /// Products: none.
    pub const PRODUCT: &[&str] = &[];
    /// Prices: tiers.
    pub const PRICE: &[&str] = &["tiers"];
    /// Subscriptions: item prices.
    pub const SUBSCRIPTION: &[&str] = &["items.data.price"];
    /// Invoices: line prices.
    pub const INVOICE: &[&str] = &["lines.data.price"];
    /// Payment intents: none.
    pub const PAYMENT_INTENT: &[&str] = &[];
    /// Charges: none.
    pub const CHARGE: &[&str] = &[];
    /// Refunds: none.
    pub const REFUND: &[&str] = &[];
}

/// Ordered `key=value` pairs in Stripe's bracket notation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams(Vec<(String, String)>);

impl FormParams {
    /// No parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of a list call.
    ///
    /// `filters["type"]` selects an endpoint and is not sent; other filters
    /// pass through as query parameters.
    #[must_use]
    pub fn list(params: &ListParams) -> Self {
        let mut form = Self::new();
        form.push("limit", params.effective_limit());
        form.push_opt("starting_after", params.starting_after.as_deref());
        form.push_opt("ending_before", params.ending_before.as_deref());
        if let Some(created) = params.created {
            form.push_opt("created[gte]", created.gte.map(|t| t.timestamp()));
            form.push_opt("created[lte]", created.lte.map(|t| t.timestamp()));
        }

        let mut filters: Vec<_> = params
            .filters
            .iter()
            .filter(|(key, _)| key.as_str() != "type")
            .collect();
        filters.sort();
        for (key, value) in filters {
            form.push(key.as_str(), value);
        }
        form
    }

    /// Append a pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    /// Append a pair if `value` is set.
    pub fn push_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// Append `metadata[key]` pairs, sorted by key.
    pub fn metadata(&mut self, metadata: &HashMap<String, String>) {
        let mut entries: Vec<_> = metadata.iter().collect();
        entries.sort();
        for (key, value) in entries {
            self.push(format!("metadata[{key}]"), value);
        }
    }

    /// Append `prefix[field]` pairs for the set fields of an address.
    pub fn address(&mut self, prefix: &str, address: &Address) {
        let fields = [
            ("line1", &address.line1),
            ("line2", &address.line2),
            ("city", &address.city),
            ("state", &address.state),
            ("postal_code", &address.postal_code),
            ("country", &address.country),
        ];
        for (field, value) in fields {
            self.push_opt(format!("{prefix}[{field}]"), value.as_deref());
        }
    }

    /// Request expansions on a single-object call.
    pub fn expand(&mut self, fields: &[&str]) {
        for field in fields {
            self.push("expand[]", field);
        }
    }

    /// Request expansions on a list call.
    pub fn expand_list(&mut self, fields: &[&str]) {
        for field in fields {
            self.push("expand[]", format!("data.{field}"));
        }
    }

    /// First value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any key starts with `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.iter().any(|(k, _)| k.starts_with(prefix))
    }

    /// The pairs, ready for `reqwest`'s `form`/`query`.
    #[must_use]
    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    /// Whether there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use paysync_core::CreatedRange;

    #[test]
    fn list_params_encode_cursor_and_filters() {
        let params = ListParams {
            limit: 500,
            starting_after: Some("cus_9".into()),
            created: Some(CreatedRange {
                gte: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
                lte: None,
            }),
            ..ListParams::default()
        }
        .filter("type", "charge")
        .filter("customer", "cus_1");

        let form = FormParams::list(&params);
        assert_eq!(form.get("limit"), Some("100"));
        assert_eq!(form.get("starting_after"), Some("cus_9"));
        assert_eq!(form.get("created[gte]"), Some("1700000000"));
        assert_eq!(form.get("customer"), Some("cus_1"));
        assert!(form.get("type").is_none());
        assert!(form.get("ending_before").is_none());
    }

    #[test]
    fn metadata_and_expansions() {
        let mut form = FormParams::new();
        form.metadata(&HashMap::from([
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]));
        form.expand_list(&["tax_ids"]);

        assert_eq!(
            form.as_slice(),
            &[
                ("metadata[a]".to_string(), "1".to_string()),
                ("metadata[b]".to_string(), "2".to_string()),
                ("expand[]".to_string(), "data.tax_ids".to_string()),
            ]
        );
    }

    #[test]
    fn address_skips_unset_fields() {
        let mut form = FormParams::new();
        form.address(
            "shipping[address]",
            &Address {
                city: Some("Lisbon".into()),
                ..Address::default()
            },
        );
        assert_eq!(form.get("shipping[address][city]"), Some("Lisbon"));
        assert!(!form.has_prefix("shipping[address][line1]"));
    }
}
