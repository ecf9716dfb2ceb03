//! Products.

use paysync_core::{Product, ProviderSync};

use super::timestamp;
use crate::params::FormParams;
use crate::types::{self, expandable_id};

/// Map a Stripe product. Workspace and wallet are assigned by reconciliation.
#[must_use]
pub fn to_canonical(product: Option<&types::Product>) -> Product {
    let Some(p) = product else {
        return Product::default();
    };

    Product {
        id: None,
        workspace_id: None,
        wallet_id: None,
        name: p.name.clone(),
        description: p.description.clone(),
        active: p.active && !p.deleted,
        images: p.images.clone(),
        unit_label: p.unit_label.clone(),
        tax_code: expandable_id(p.tax_code.as_ref()),
        metadata: p.metadata.clone(),
        sync: ProviderSync::external(&p.id),
        created_at: timestamp(p.created),
        updated_at: timestamp(p.updated),
    }
}

/// Form body for creating or updating a product.
#[must_use]
pub fn to_params(product: &Product) -> FormParams {
    let mut form = FormParams::new();
    form.push("name", &product.name);
    form.push_opt("description", product.description.as_deref());
    form.push("active", product.active);
    for (i, image) in product.images.iter().enumerate() {
        form.push(format!("images[{i}]"), image);
    }
    form.push_opt("unit_label", product.unit_label.as_deref());
    form.push_opt("tax_code", product.tax_code.as_deref());
    form.metadata(&product.metadata);
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysync_core::SyncRecord;
    use serde_json::json;

    #[test]
    fn none_maps_to_zero_value() {
        assert_eq!(to_canonical(None), Product::default());
    }

    #[test]
    fn maps_product() {
        let stripe: types::Product = serde_json::from_value(json!({
            "id": "prod_1",
            "name": "Pro",
            "active": true,
            "images": ["https://example.com/pro.png"],
            "tax_code": "txcd_10000000",
            "metadata": {"wallet_id": "w"},
            "created": 1_700_000_000,
            "updated": 1_700_000_100
        }))
        .unwrap();

        let product = to_canonical(Some(&stripe));
        assert_eq!(product.external_id(), "prod_1");
        assert!(product.active);
        assert_eq!(product.tax_code.as_deref(), Some("txcd_10000000"));
        assert_eq!(product.metadata["wallet_id"], "w");
        assert!(product.workspace_id.is_none());
        assert_eq!(product.updated_at.unwrap().timestamp(), 1_700_000_100);
    }

    #[test]
    fn deleted_product_is_inactive() {
        let stripe: types::Product =
            serde_json::from_value(json!({"id": "prod_1", "active": true, "deleted": true}))
                .unwrap();
        assert!(!to_canonical(Some(&stripe)).active);
    }

    #[test]
    fn params() {
        let product = Product {
            name: "Pro".into(),
            active: true,
            images: vec!["a.png".into()],
            ..Product::default()
        };
        let form = to_params(&product);
        assert_eq!(form.get("name"), Some("Pro"));
        assert_eq!(form.get("active"), Some("true"));
        assert_eq!(form.get("images[0]"), Some("a.png"));
        assert!(form.get("description").is_none());
    }
}
