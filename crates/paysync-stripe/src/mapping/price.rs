//! Prices.
//!
//! Stripe has no term length, so it travels in price metadata under
//! [`TERM_LENGTH_KEY`]. A recurring price without one gets a term of 1.

use paysync_core::{
    IntervalType, Price, PriceTier, PriceType, ProviderSync, TaxBehavior, TiersMode,
};

use super::{canonical_currency, non_empty, provider_currency, timestamp};
use crate::params::FormParams;
use crate::types::{self, expandable_id};

/// Metadata key carrying the canonical term length.
pub const TERM_LENGTH_KEY: &str = "term_length";

/// Map a Stripe price.
#[must_use]
pub fn to_canonical(price: Option<&types::Price>) -> Price {
    let Some(p) = price else {
        return Price::default();
    };

    let mut metadata = p.metadata.clone();
    let term_length = metadata
        .remove(TERM_LENGTH_KEY)
        .and_then(|t| t.trim().parse::<i32>().ok())
        .filter(|t| *t > 0);

    let recurring = p
        .recurring
        .as_ref()
        .filter(|_| p.price_type != "one_time")
        .and_then(|r| IntervalType::parse(&r.interval).map(|i| (i, r.interval_count)));

    let (price_type, interval_type, interval_count, term_length) = match recurring {
        Some((interval, count)) => (
            PriceType::Recurring,
            Some(interval),
            Some(i32::try_from(count).unwrap_or(1).max(1)),
            Some(term_length.unwrap_or(1)),
        ),
        None => (PriceType::OneTime, None, None, None),
    };

    Price {
        id: None,
        product_id: None,
        workspace_id: None,
        external_product_id: expandable_id(p.product.as_ref()).unwrap_or_default(),
        active: p.active,
        amount: p.unit_amount.unwrap_or(0),
        currency: canonical_currency(&p.currency),
        price_type,
        interval_type,
        interval_count,
        term_length,
        nickname: p.nickname.clone(),
        lookup_key: p.lookup_key.clone(),
        tiers: p
            .tiers
            .as_ref()
            .and_then(|tiers| non_empty(tiers.iter().map(tier).collect())),
        tiers_mode: p.tiers_mode.as_deref().and_then(parse_tiers_mode),
        tax_behavior: p.tax_behavior.as_deref().and_then(parse_tax_behavior),
        metadata,
        sync: ProviderSync::external(&p.id),
        created_at: timestamp(p.created),
        updated_at: None,
    }
}

/// Form body for creating a price.
#[must_use]
pub fn to_params(price: &Price) -> FormParams {
    let mut form = FormParams::new();
    if !price.external_product_id.is_empty() {
        form.push("product", &price.external_product_id);
    }
    form.push("currency", provider_currency(&price.currency));
    form.push("active", price.active);

    match price.tiers.as_deref() {
        Some(tiers) if !tiers.is_empty() => {
            form.push("billing_scheme", "tiered");
            form.push(
                "tiers_mode",
                tiers_mode_str(price.tiers_mode.unwrap_or(TiersMode::Graduated)),
            );
            for (i, t) in tiers.iter().enumerate() {
                match t.up_to {
                    Some(up_to) => form.push(format!("tiers[{i}][up_to]"), up_to),
                    None => form.push(format!("tiers[{i}][up_to]"), "inf"),
                }
                form.push_opt(format!("tiers[{i}][unit_amount]"), t.unit_amount);
                form.push_opt(format!("tiers[{i}][flat_amount]"), t.flat_amount);
            }
        }
        _ => form.push("unit_amount", price.amount),
    }

    if price.price_type == PriceType::Recurring {
        if let Some(interval) = price.interval_type {
            form.push("recurring[interval]", interval.as_str());
        }
        form.push("recurring[interval_count]", price.interval_count.unwrap_or(1));
    }

    form.push_opt("nickname", price.nickname.as_deref());
    form.push_opt("lookup_key", price.lookup_key.as_deref());
    form.push_opt("tax_behavior", price.tax_behavior.map(tax_behavior_str));
    form.metadata(&metadata_with_term(price));
    form
}

/// Form body for updating a price. Stripe prices are immutable apart from
/// these fields.
#[must_use]
pub fn to_update_params(price: &Price) -> FormParams {
    let mut form = FormParams::new();
    form.push("active", price.active);
    form.push_opt("nickname", price.nickname.as_deref());
    form.push_opt("lookup_key", price.lookup_key.as_deref());
    form.metadata(&metadata_with_term(price));
    form
}

fn metadata_with_term(price: &Price) -> paysync_core::Metadata {
    let mut metadata = price.metadata.clone();
    metadata.remove(TERM_LENGTH_KEY);
    if price.price_type == PriceType::Recurring {
        metadata.insert(
            TERM_LENGTH_KEY.to_string(),
            price.term_length.unwrap_or(1).to_string(),
        );
    }
    metadata
}

fn tier(t: &types::PriceTier) -> PriceTier {
    PriceTier {
        up_to: t.up_to,
        unit_amount: t.unit_amount,
        flat_amount: t.flat_amount,
    }
}

fn parse_tiers_mode(s: &str) -> Option<TiersMode> {
    match s {
        "volume" => Some(TiersMode::Volume),
        "graduated" => Some(TiersMode::Graduated),
        _ => None,
    }
}

const fn tiers_mode_str(mode: TiersMode) -> &'static str {
    match mode {
        TiersMode::Volume => "volume",
        TiersMode::Graduated => "graduated",
    }
}

fn parse_tax_behavior(s: &str) -> Option<TaxBehavior> {
    match s {
        "exclusive" => Some(TaxBehavior::Exclusive),
        "inclusive" => Some(TaxBehavior::Inclusive),
        "unspecified" => Some(TaxBehavior::Unspecified),
        _ => None,
    }
}

const fn tax_behavior_str(behavior: TaxBehavior) -> &'static str {
    match behavior {
        TaxBehavior::Exclusive => "exclusive",
        TaxBehavior::Inclusive => "inclusive",
        TaxBehavior::Unspecified => "unspecified",
    }
}
