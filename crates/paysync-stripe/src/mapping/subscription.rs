//! Subscriptions.

use paysync_core::{ProviderSync, Subscription, SubscriptionItem, SubscriptionStatus};

use super::{opt_timestamp, timestamp};
use crate::params::FormParams;
use crate::types::{self, expandable_id};

/// Map a Stripe subscription.
///
/// Newer API versions moved the billing period onto the items; the first
/// item's period fills in when the subscription carries none.
#[must_use]
pub fn to_canonical(subscription: Option<&types::Subscription>) -> Subscription {
    let Some(s) = subscription else {
        return Subscription::default();
    };

    let first_item = s.items.data.first();
    let period_start = s
        .current_period_start
        .or_else(|| first_item.and_then(|i| i.current_period_start));
    let period_end = s
        .current_period_end
        .or_else(|| first_item.and_then(|i| i.current_period_end));

    Subscription {
        id: None,
        customer_id: None,
        external_customer_id: expandable_id(s.customer.as_ref()).unwrap_or_default(),
        workspace_id: None,
        status: SubscriptionStatus::parse(&s.status),
        items: s.items.data.iter().map(item).collect(),
        current_period_start: opt_timestamp(period_start),
        current_period_end: opt_timestamp(period_end),
        cancel_at_period_end: s.cancel_at_period_end,
        cancel_at: opt_timestamp(s.cancel_at),
        canceled_at: opt_timestamp(s.canceled_at),
        ended_at: opt_timestamp(s.ended_at),
        trial_start: opt_timestamp(s.trial_start),
        trial_end: opt_timestamp(s.trial_end),
        collection_method: s.collection_method.clone(),
        default_tax_rates: s
            .default_tax_rates
            .iter()
            .map(|rate| rate.id().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
        metadata: s.metadata.clone(),
        sync: ProviderSync::external(&s.id),
        created_at: timestamp(s.created),
        updated_at: None,
    }
}

fn item(i: &types::SubscriptionItem) -> SubscriptionItem {
    SubscriptionItem {
        external_id: i.id.clone(),
        price_id: None,
        external_price_id: expandable_id(i.price.as_ref()).unwrap_or_default(),
        quantity: i.quantity.unwrap_or(0),
        metadata: i.metadata.clone(),
    }
}

/// Form body for creating a subscription.
#[must_use]
pub fn to_params(subscription: &Subscription) -> FormParams {
    let mut form = FormParams::new();
    form.push("customer", &subscription.external_customer_id);
    for (i, item) in subscription.items.iter().enumerate() {
        form.push(format!("items[{i}][price]"), &item.external_price_id);
        if item.quantity > 0 {
            form.push(format!("items[{i}][quantity]"), item.quantity);
        }
    }
    common(&mut form, subscription);
    form.push_opt("trial_end", subscription.trial_end.map(|t| t.timestamp()));
    form
}

/// Form body for updating a subscription. Items that already exist at the
/// provider are addressed by their item id.
#[must_use]
pub fn to_update_params(subscription: &Subscription) -> FormParams {
    let mut form = FormParams::new();
    for (i, item) in subscription.items.iter().enumerate() {
        if !item.external_id.is_empty() {
            form.push(format!("items[{i}][id]"), &item.external_id);
        }
        if !item.external_price_id.is_empty() {
            form.push(format!("items[{i}][price]"), &item.external_price_id);
        }
        if item.quantity > 0 {
            form.push(format!("items[{i}][quantity]"), item.quantity);
        }
    }
    common(&mut form, subscription);
    form
}

fn common(form: &mut FormParams, subscription: &Subscription) {
    form.push("cancel_at_period_end", subscription.cancel_at_period_end);
    form.push_opt("collection_method", subscription.collection_method.as_deref());
    for (i, rate) in subscription.default_tax_rates.iter().enumerate() {
        form.push(format!("default_tax_rates[{i}]"), rate);
    }
    form.metadata(&subscription.metadata);
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysync_core::SyncRecord;
    use serde_json::json;

    fn stripe_subscription(value: serde_json::Value) -> types::Subscription {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn none_maps_to_zero_value() {
        assert_eq!(to_canonical(None), Subscription::default());
    }

    #[test]
    fn maps_items_and_periods() {
        let sub = to_canonical(Some(&stripe_subscription(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "items": {
                "object": "list",
                "data": [{
                    "id": "si_1",
                    "price": {"id": "price_1", "currency": "usd", "type": "recurring"},
                    "quantity": 2
                }],
                "has_more": false
            },
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "default_tax_rates": [{"id": "txr_1"}, "txr_2"],
            "created": 1_700_000_000
        }))));

        assert_eq!(sub.external_id(), "sub_1");
        assert_eq!(sub.external_customer_id, "cus_1");
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.items.len(), 1);
        assert_eq!(sub.items[0].external_price_id, "price_1");
        assert_eq!(sub.items[0].quantity, 2);
        assert_eq!(sub.default_tax_rates, vec!["txr_1", "txr_2"]);
        assert_eq!(sub.current_period_end.unwrap().timestamp(), 1_702_592_000);
        sub.validate().unwrap();
    }

    #[test]
    fn period_falls_back_to_first_item() {
        let sub = to_canonical(Some(&stripe_subscription(json!({
            "id": "sub_1",
            "customer": {"id": "cus_1"},
            "status": "trialing",
            "items": {
                "object": "list",
                "data": [{
                    "id": "si_1",
                    "price": "price_1",
                    "current_period_start": 1_700_000_000,
                    "current_period_end": 1_702_592_000
                }],
                "has_more": false
            }
        }))));

        assert_eq!(sub.external_customer_id, "cus_1");
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.items[0].quantity, 0);
        assert_eq!(sub.current_period_start.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn unknown_status_is_incomplete() {
        let sub = to_canonical(Some(&stripe_subscription(json!({
            "id": "sub_1",
            "status": "something_new",
            "items": {"object": "list", "data": [], "has_more": false}
        }))));
        assert_eq!(sub.status, SubscriptionStatus::Incomplete);
    }

    #[test]
    fn create_and_update_params() {
        let sub = Subscription {
            external_customer_id: "cus_1".into(),
            items: vec![SubscriptionItem {
                external_id: "si_1".into(),
                external_price_id: "price_1".into(),
                quantity: 3,
                ..SubscriptionItem::default()
            }],
            ..Subscription::default()
        };

        let create = to_params(&sub);
        assert_eq!(create.get("customer"), Some("cus_1"));
        assert_eq!(create.get("items[0][price]"), Some("price_1"));
        assert_eq!(create.get("items[0][quantity]"), Some("3"));
        assert!(create.get("items[0][id]").is_none());

        let update = to_update_params(&sub);
        assert_eq!(update.get("items[0][id]"), Some("si_1"));
        assert!(update.get("customer").is_none());
        assert_eq!(update.get("cancel_at_period_end"), Some("false"));
    }
}
