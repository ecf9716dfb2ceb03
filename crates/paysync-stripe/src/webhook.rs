//! Stripe webhook verification and event mapping.
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! The signed payload is `"{t}.{body}"` under HMAC-SHA256 with the endpoint
//! secret. Several `v1` entries appear while a secret is being rolled.

use std::time::Duration;

use chrono::Utc;
use paysync_core::{WebhookData, WebhookEvent};
use paysync_sync::{IngestStage, WebhookError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::mapping::{self, timestamp};
use crate::types::{self, Event};

/// Provider name written on events and records.
pub const PROVIDER_NAME: &str = "stripe";

/// Maximum age of a signed timestamp.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, String> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or("missing timestamp")?
        .parse::<i64>()
        .map_err(|_| "timestamp is not an integer".to_string())?;

    if signatures.is_empty() {
        return Err("no v1 signature".into());
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Verify `header` against `payload` at time `now` (Unix seconds).
///
/// A zero `tolerance` disables the timestamp check.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
pub fn verify_signature_at(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance: Duration,
    now: i64,
) -> Result<(), String> {
    let parsed = parse_header(header)?;

    let signed_at = parsed.timestamp.to_string();
    let expected = hmac_sha256_hex(secret, &[signed_at.as_bytes(), b".", payload]);
    if !parsed
        .signatures
        .iter()
        .any(|sig| constant_time_eq(&expected, sig))
    {
        return Err("no matching v1 signature".into());
    }

    if !tolerance.is_zero() {
        let age = now.saturating_sub(parsed.timestamp).unsigned_abs();
        if age > tolerance.as_secs() {
            return Err(format!("timestamp outside tolerance ({age}s)"));
        }
    }

    Ok(())
}

/// Verify `header` against `payload` now.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance: Duration,
) -> Result<(), String> {
    verify_signature_at(secret, payload, header, tolerance, Utc::now().timestamp())
}

/// Build a signature header for `payload`, as Stripe would send it.
#[must_use]
pub fn sign_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let signature = hmac_sha256_hex(secret, &[timestamp.to_string().as_bytes(), b".", payload]);
    format!("t={timestamp},v1={signature}")
}

/// Decode a verified body into a canonical event.
///
/// # Errors
///
/// Returns `WebhookError::Malformed` at stage `Parsed` if the envelope does
/// not decode, or at stage `Mapped` if the object does not decode as the type
/// its event type announces.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let event: Event = serde_json::from_slice(payload).map_err(|e| WebhookError::Malformed {
        stage: IngestStage::Parsed,
        message: e.to_string(),
    })?;

    if event.id.is_empty() || event.event_type.is_empty() {
        return Err(WebhookError::Malformed {
            stage: IngestStage::Parsed,
            message: "event id and type are required".into(),
        });
    }

    let data = map_object(&event.event_type, event.data.object).map_err(|e| {
        WebhookError::Malformed {
            stage: IngestStage::Mapped,
            message: format!("{}: {e}", event.event_type),
        }
    })?;

    Ok(WebhookEvent {
        id: None,
        provider: PROVIDER_NAME.to_string(),
        provider_event_id: event.id,
        event_type: event.event_type,
        raw_data: payload.to_vec(),
        signature_valid: true,
        data: Some(data),
        livemode: event.livemode,
        created_at: timestamp(event.created),
        received_at: Utc::now(),
    })
}

/// Which mapper an event type routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Customer,
    Product,
    Price,
    Subscription,
    Invoice,
    PaymentIntent,
    Charge,
    Refund,
    Unrecognized,
}

fn route(event_type: &str) -> Route {
    if event_type.starts_with("customer.subscription.") {
        Route::Subscription
    } else if matches!(
        event_type,
        "customer.created" | "customer.updated" | "customer.deleted"
    ) {
        Route::Customer
    } else if event_type.starts_with("product.") {
        Route::Product
    } else if event_type.starts_with("price.") {
        Route::Price
    } else if event_type.starts_with("invoice.") {
        Route::Invoice
    } else if event_type.starts_with("payment_intent.") {
        Route::PaymentIntent
    } else if event_type == "charge.refund.updated" || event_type.starts_with("refund.") {
        Route::Refund
    } else if event_type.starts_with("charge.dispute.") {
        Route::Unrecognized
    } else if event_type.starts_with("charge.") {
        Route::Charge
    } else {
        Route::Unrecognized
    }
}

fn map_object(event_type: &str, object: Value) -> Result<WebhookData, serde_json::Error> {
    fn decode<T: DeserializeOwned>(object: Value) -> Result<T, serde_json::Error> {
        serde_json::from_value(object)
    }

    Ok(match route(event_type) {
        Route::Customer => {
            WebhookData::Customer(mapping::customer::to_canonical(Some(&decode(object)?)))
        }
        Route::Product => {
            WebhookData::Product(mapping::product::to_canonical(Some(&decode(object)?)))
        }
        Route::Price => WebhookData::Price(mapping::price::to_canonical(Some(&decode(object)?))),
        Route::Subscription => WebhookData::Subscription(mapping::subscription::to_canonical(
            Some(&decode(object)?),
        )),
        Route::Invoice => {
            WebhookData::Invoice(mapping::invoice::to_canonical(Some(&decode(object)?)))
        }
        Route::PaymentIntent => {
            let intent: types::PaymentIntent = decode(object)?;
            WebhookData::Transaction(mapping::transaction::from_payment_intent(Some(&intent)))
        }
        Route::Charge => {
            let charge: types::Charge = decode(object)?;
            WebhookData::Transaction(mapping::transaction::from_charge(Some(&charge)))
        }
        Route::Refund => {
            let refund: types::Refund = decode(object)?;
            WebhookData::Transaction(mapping::transaction::from_refund(Some(&refund)))
        }
        Route::Unrecognized => WebhookData::Unrecognized(object),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysync_core::{SyncRecord, TransactionType};
    use serde_json::json;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn header_parsing() {
        let parsed = parse_header("t=123, v1=abc,v1=def,v0=old").unwrap();
        assert_eq!(parsed.timestamp, 123);
        assert_eq!(parsed.signatures, vec!["abc", "def"]);

        assert!(parse_header("v1=abc").is_err());
        assert!(parse_header("t=123").is_err());
        assert!(parse_header("t=abc,v1=abc").is_err());
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign_payload(SECRET, body, NOW);
        verify_signature_at(SECRET, body, &header, DEFAULT_TOLERANCE, NOW + 10).unwrap();
    }

    #[test]
    fn any_v1_may_match() {
        let body = b"{}";
        let good = sign_payload(SECRET, body, NOW);
        let sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v1={sig}");
        verify_signature_at(SECRET, body, &header, DEFAULT_TOLERANCE, NOW).unwrap();
    }

    #[test]
    fn rejects_tampered_body_and_wrong_secret() {
        let header = sign_payload(SECRET, b"{\"a\":1}", NOW);
        let tampered = verify_signature_at(SECRET, b"{\"a\":2}", &header, DEFAULT_TOLERANCE, NOW);
        assert!(tampered.is_err());
        assert!(
            verify_signature_at("whsec_other", b"{\"a\":1}", &header, DEFAULT_TOLERANCE, NOW)
                .is_err()
        );
    }

    #[test]
    fn tolerance_applies_unless_zero() {
        let header = sign_payload(SECRET, b"{}", NOW);
        let late = NOW + 301;
        let err =
            verify_signature_at(SECRET, b"{}", &header, DEFAULT_TOLERANCE, late).unwrap_err();
        assert!(err.contains("tolerance"));
        verify_signature_at(SECRET, b"{}", &header, Duration::ZERO, late).unwrap();
    }

    #[test]
    fn routing() {
        assert_eq!(route("customer.created"), Route::Customer);
        assert_eq!(route("customer.subscription.updated"), Route::Subscription);
        assert_eq!(route("customer.tax_id.created"), Route::Unrecognized);
        assert_eq!(route("price.deleted"), Route::Price);
        assert_eq!(route("invoice.paid"), Route::Invoice);
        assert_eq!(route("invoiceitem.created"), Route::Unrecognized);
        assert_eq!(route("charge.succeeded"), Route::Charge);
        assert_eq!(route("charge.refund.updated"), Route::Refund);
        assert_eq!(route("charge.dispute.created"), Route::Unrecognized);
        assert_eq!(route("refund.created"), Route::Refund);
        assert_eq!(route("payment_intent.succeeded"), Route::PaymentIntent);
        assert_eq!(route("balance.available"), Route::Unrecognized);
    }

    #[test]
    fn parses_customer_event() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "customer.updated",
            "created": NOW,
            "livemode": false,
            "data": {"object": {"id": "cus_1", "email": "ada@example.com"}}
        }))
        .unwrap();

        let event = parse_event(&body).unwrap();
        assert_eq!(event.provider, PROVIDER_NAME);
        assert_eq!(event.provider_event_id, "evt_1");
        assert!(event.signature_valid);
        assert_eq!(event.raw_data, body);
        match event.data {
            Some(WebhookData::Customer(c)) => assert_eq!(c.external_id(), "cus_1"),
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn refund_event_maps_to_transaction() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_2",
            "type": "charge.refund.updated",
            "data": {"object": {"id": "re_1", "amount": 100, "currency": "usd", "charge": "ch_1"}}
        }))
        .unwrap();

        match parse_event(&body).unwrap().data {
            Some(WebhookData::Transaction(tx)) => {
                assert_eq!(tx.transaction_type, TransactionType::Refund);
                assert_eq!(tx.external_parent_id.as_deref(), Some("ch_1"));
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_keeps_json() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_3",
            "type": "balance.available",
            "data": {"object": {"object": "balance", "available": []}}
        }))
        .unwrap();

        match parse_event(&body).unwrap().data {
            Some(WebhookData::Unrecognized(value)) => assert_eq!(value["object"], "balance"),
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn malformed_stages() {
        let err = parse_event(b"not json").unwrap_err();
        assert_eq!(err.stage(), IngestStage::Parsed);

        let body = serde_json::to_vec(&json!({
            "id": "evt_4",
            "type": "customer.updated",
            "data": {"object": {"id": 42}}
        }))
        .unwrap();
        let err = parse_event(&body).unwrap_err();
        assert_eq!(err.stage(), IngestStage::Mapped);
    }
}
