//! Customers.

use paysync_core::{Address, Customer, ProviderSync, Shipping, TaxId};

use super::{non_empty, timestamp};
use crate::params::FormParams;
use crate::types;

/// Map a Stripe customer.
#[must_use]
pub fn to_canonical(customer: Option<&types::Customer>) -> Customer {
    let Some(c) = customer else {
        return Customer::default();
    };

    Customer {
        id: None,
        email: c.email.clone(),
        name: c.name.clone(),
        phone: c.phone.clone(),
        description: c.description.clone(),
        address: c.address.as_ref().map(address),
        shipping: c.shipping.as_ref().map(|s| Shipping {
            name: s.name.clone(),
            phone: s.phone.clone(),
            address: s.address.as_ref().map(address),
        }),
        tax_ids: c
            .tax_ids
            .as_ref()
            .and_then(|list| non_empty(list.data.iter().map(tax_id).collect())),
        preferred_locales: c.preferred_locales.clone().unwrap_or_default(),
        metadata: c.metadata.clone(),
        sync: ProviderSync::external(&c.id),
        created_at: timestamp(c.created),
        updated_at: None,
    }
}

/// Form body for creating or updating a customer.
#[must_use]
pub fn to_params(customer: &Customer) -> FormParams {
    let mut form = FormParams::new();
    form.push_opt("email", customer.email.as_deref());
    form.push_opt("name", customer.name.as_deref());
    form.push_opt("phone", customer.phone.as_deref());
    form.push_opt("description", customer.description.as_deref());
    if let Some(address) = &customer.address {
        form.address("address", address);
    }
    if let Some(shipping) = &customer.shipping {
        form.push_opt("shipping[name]", shipping.name.as_deref());
        form.push_opt("shipping[phone]", shipping.phone.as_deref());
        if let Some(address) = &shipping.address {
            form.address("shipping[address]", address);
        }
    }
    for (i, locale) in customer.preferred_locales.iter().enumerate() {
        form.push(format!("preferred_locales[{i}]"), locale);
    }
    form.metadata(&customer.metadata);
    form
}

pub(crate) fn address(a: &types::Address) -> Address {
    Address {
        line1: a.line1.clone(),
        line2: a.line2.clone(),
        city: a.city.clone(),
        state: a.state.clone(),
        postal_code: a.postal_code.clone(),
        country: a.country.clone(),
    }
}

fn tax_id(t: &types::TaxId) -> TaxId {
    TaxId {
        external_id: Some(t.id.clone()).filter(|id| !id.is_empty()),
        kind: t.kind.clone(),
        value: t.value.clone(),
        country: t.country.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysync_core::SyncRecord;
    use serde_json::json;

    #[test]
    fn none_maps_to_zero_value() {
        assert_eq!(to_canonical(None), Customer::default());
    }

    #[test]
    fn maps_expanded_customer() {
        let stripe: types::Customer = serde_json::from_value(json!({
            "id": "cus_1",
            "email": "ada@example.com",
            "name": "Ada",
            "address": {"city": "London", "country": "GB"},
            "tax_ids": {
                "object": "list",
                "data": [{"id": "txi_1", "type": "gb_vat", "value": "GB123", "country": "GB"}],
                "has_more": false
            },
            "preferred_locales": ["en"],
            "metadata": {"plan": "pro"},
            "created": 1_700_000_000
        }))
        .unwrap();

        let customer = to_canonical(Some(&stripe));
        assert_eq!(customer.external_id(), "cus_1");
        assert_eq!(customer.email.as_deref(), Some("ada@example.com"));
        assert_eq!(customer.address.unwrap().city.as_deref(), Some("London"));
        let tax_ids = customer.tax_ids.unwrap();
        assert_eq!(tax_ids[0].kind, "gb_vat");
        assert_eq!(tax_ids[0].external_id.as_deref(), Some("txi_1"));
        assert_eq!(customer.preferred_locales, vec!["en"]);
        assert_eq!(customer.metadata["plan"], "pro");
        assert_eq!(customer.created_at.unwrap().timestamp(), 1_700_000_000);
        assert!(customer.id.is_none());
    }

    #[test]
    fn unexpanded_or_empty_tax_ids_are_absent() {
        let stripe: types::Customer = serde_json::from_value(json!({"id": "cus_1"})).unwrap();
        assert!(to_canonical(Some(&stripe)).tax_ids.is_none());

        let stripe: types::Customer = serde_json::from_value(json!({
            "id": "cus_1",
            "tax_ids": {"object": "list", "data": [], "has_more": false}
        }))
        .unwrap();
        assert!(to_canonical(Some(&stripe)).tax_ids.is_none());
    }

    #[test]
    fn params_carry_nested_fields() {
        let customer = Customer {
            email: Some("ada@example.com".into()),
            shipping: Some(Shipping {
                name: Some("Ada".into()),
                address: Some(Address {
                    line1: Some("1 Main St".into()),
                    ..Address::default()
                }),
                ..Shipping::default()
            }),
            preferred_locales: vec!["en".into(), "pt".into()],
            metadata: [("plan".to_string(), "pro".to_string())].into(),
            ..Customer::default()
        };

        let form = to_params(&customer);
        assert_eq!(form.get("email"), Some("ada@example.com"));
        assert_eq!(form.get("shipping[name]"), Some("Ada"));
        assert_eq!(form.get("shipping[address][line1]"), Some("1 Main St"));
        assert_eq!(form.get("preferred_locales[1]"), Some("pt"));
        assert_eq!(form.get("metadata[plan]"), Some("pro"));
        assert!(form.get("name").is_none());
    }
}
