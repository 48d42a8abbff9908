//! Inbound payment-provider webhooks: signature checks and event parsing.
//!
//! # Signatures
//!
//! - Stripe: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>]`, HMAC-SHA256
//!   of `"<t>.<body>"`
//! - Paddle: `Paddle-Signature: ts=<unix>;h1=<hex>`, HMAC-SHA256 of
//!   `"<ts>:<body>"`
//!
//! Both are keyed with the endpoint secret and rejected when the timestamp is
//! further than the configured tolerance from now.
//!
//! # Invoice reference
//!
//! The checkout is created with metadata (`metadata` on Stripe,
//! `custom_data` on Paddle) holding `invoice_id` and/or `payment_token`.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::payment::{PaymentProvider, ProviderPayment},
    services::secrets::verify_hmac_sha256_hex,
};

/// Verify a `Stripe-Signature` header against the raw request body.
pub fn verify_stripe_signature(
    header: &str,
    body: &[u8],
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    check_timestamp(timestamp, now, tolerance_secs)?;

    let signed = signed_payload(timestamp, '.', body);
    if signatures
        .iter()
        .any(|sig| verify_hmac_sha256_hex(secret.as_bytes(), &signed, sig))
    {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

/// Verify a `Paddle-Signature` header against the raw request body.
pub fn verify_paddle_signature(
    header: &str,
    body: &[u8],
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(';') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("h1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    check_timestamp(timestamp, now, tolerance_secs)?;

    let signed = signed_payload(timestamp, ':', body);
    if signatures
        .iter()
        .any(|sig| verify_hmac_sha256_hex(secret.as_bytes(), &signed, sig))
    {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

fn check_timestamp(timestamp: i64, now: i64, tolerance_secs: i64) -> Result<(), AppError> {
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(AppError::InvalidSignature);
    }
    Ok(())
}

fn signed_payload(timestamp: i64, separator: char, body: &[u8]) -> Vec<u8> {
    let mut signed = format!("{timestamp}{separator}").into_bytes();
    signed.extend_from_slice(body);
    signed
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct PaddleEvent {
    event_id: String,
    event_type: String,
    data: Value,
}

/// Parse a Stripe event body.
///
/// Returns `Ok(None)` for events that do not settle an invoice.
pub fn parse_stripe_event(body: &[u8]) -> Result<Option<ProviderPayment>, AppError> {
    let event: StripeEvent = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid Stripe event: {e}")))?;
    let object = &event.data.object;

    let (reference, amount_cents) = match event.event_type.as_str() {
        "checkout.session.completed" => {
            // Delayed payment methods complete the session before the money arrives.
            if object.get("payment_status").and_then(Value::as_str) != Some("paid") {
                return Ok(None);
            }
            let reference = object
                .get("payment_intent")
                .and_then(Value::as_str)
                .or_else(|| object.get("id").and_then(Value::as_str));
            (reference, object.get("amount_total").and_then(Value::as_i64))
        }
        "payment_intent.succeeded" => (
            object.get("id").and_then(Value::as_str),
            object.get("amount_received").and_then(Value::as_i64),
        ),
        _ => return Ok(None),
    };

    let reference = reference
        .ok_or_else(|| AppError::InvalidRequest("Stripe event without object id".to_string()))?;
    let (mut invoice_id, payment_token) = invoice_reference(object.get("metadata"))?;

    if invoice_id.is_none() {
        invoice_id = object
            .get("client_reference_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok());
    }

    Ok(Some(ProviderPayment {
        provider: PaymentProvider::Stripe,
        event_id: event.id,
        event_type: event.event_type,
        reference: reference.to_string(),
        invoice_id,
        payment_token,
        amount_cents,
    }))
}

/// Parse a Paddle Billing event body.
///
/// Returns `Ok(None)` for events that do not settle an invoice.
pub fn parse_paddle_event(body: &[u8]) -> Result<Option<ProviderPayment>, AppError> {
    let event: PaddleEvent = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid Paddle event: {e}")))?;

    if event.event_type != "transaction.completed" {
        return Ok(None);
    }

    let data = &event.data;
    let reference = data
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidRequest("Paddle event without transaction id".to_string()))?;

    // Paddle sends totals as strings in the lowest currency unit.
    let amount_cents = data
        .pointer("/details/totals/grand_total")
        .and_then(|v| match v {
            Value::String(s) => s.parse::<i64>().ok(),
            other => other.as_i64(),
        });

    let (invoice_id, payment_token) = invoice_reference(data.get("custom_data"))?;

    Ok(Some(ProviderPayment {
        provider: PaymentProvider::Paddle,
        event_id: event.event_id,
        event_type: event.event_type,
        reference: reference.to_string(),
        invoice_id,
        payment_token,
        amount_cents,
    }))
}

/// Read `invoice_id` and `payment_token` from provider metadata.
fn invoice_reference(metadata: Option<&Value>) -> Result<(Option<Uuid>, Option<String>), AppError> {
    let Some(metadata) = metadata else {
        return Ok((None, None));
    };

    let invoice_id = match metadata.get("invoice_id").and_then(Value::as_str) {
        Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
            AppError::InvalidRequest(format!("Invalid invoice_id in metadata: {raw}"))
        })?),
        None => None,
    };
    let payment_token = metadata
        .get("payment_token")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok((invoice_id, payment_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::secrets::hmac_sha256_hex;
    use serde_json::json;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_767_225_600;

    fn stripe_header(body: &[u8], timestamp: i64) -> String {
        let signature = hmac_sha256_hex(SECRET.as_bytes(), &signed_payload(timestamp, '.', body));
        format!("t={timestamp},v1={signature},v0=deadbeef")
    }

    fn paddle_header(body: &[u8], timestamp: i64) -> String {
        let signature = hmac_sha256_hex(SECRET.as_bytes(), &signed_payload(timestamp, ':', body));
        format!("ts={timestamp};h1={signature}")
    }

    #[test]
    fn stripe_signature_accepts_valid_header() {
        let body = br#"{"id":"evt_1"}"#;
        let header = stripe_header(body, NOW - 10);
        assert!(verify_stripe_signature(&header, body, SECRET, NOW, 300).is_ok());
    }

    #[test]
    fn stripe_signature_rejects_tampered_body_and_stale_timestamp() {
        let body = br#"{"id":"evt_1"}"#;
        let header = stripe_header(body, NOW);
        assert!(verify_stripe_signature(&header, br#"{"id":"evt_2"}"#, SECRET, NOW, 300).is_err());

        let stale = stripe_header(body, NOW - 301);
        assert!(verify_stripe_signature(&stale, body, SECRET, NOW, 300).is_err());

        assert!(verify_stripe_signature("v1=abc", body, SECRET, NOW, 300).is_err());
        assert!(verify_stripe_signature(&header, body, "wrong", NOW, 300).is_err());
    }

    #[test]
    fn stripe_signature_accepts_any_matching_v1() {
        let body = b"{}";
        let good = hmac_sha256_hex(SECRET.as_bytes(), &signed_payload(NOW, '.', body));
        let header = format!("t={NOW},v1=00ff,v1={good}");
        assert!(verify_stripe_signature(&header, body, SECRET, NOW, 300).is_ok());
    }

    #[test]
    fn extreme_timestamps_are_rejected() {
        let body = b"{}";
        assert!(matches!(
            verify_stripe_signature("t=-9223372036854775808,v1=00", body, SECRET, NOW, 300),
            Err(AppError::InvalidSignature)
        ));
        assert!(matches!(
            verify_stripe_signature("t=9223372036854775807,v1=00", body, SECRET, NOW, 300),
            Err(AppError::InvalidSignature)
        ));
        assert!(matches!(
            verify_paddle_signature("ts=-9223372036854775808;h1=00", body, SECRET, NOW, 300),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn paddle_signature_round_trip() {
        let body = br#"{"event_id":"evt_01"}"#;
        let header = paddle_header(body, NOW);
        assert!(verify_paddle_signature(&header, body, SECRET, NOW + 5, 300).is_ok());
        assert!(verify_paddle_signature(&header, b"{}", SECRET, NOW, 300).is_err());
        let stripe_style = stripe_header(body, NOW);
        assert!(verify_paddle_signature(&stripe_style, body, SECRET, NOW, 300).is_err());
    }

    #[test]
    fn parses_paid_checkout_session() {
        let invoice_id = Uuid::new_v4();
        let body = json!({
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "payment_intent": "pi_42",
                "payment_status": "paid",
                "amount_total": 12000,
                "metadata": { "invoice_id": invoice_id.to_string(), "payment_token": "tok" }
            }}
        })
        .to_string();

        let payment = parse_stripe_event(body.as_bytes()).unwrap().unwrap();
        assert_eq!(payment.provider, PaymentProvider::Stripe);
        assert_eq!(payment.event_id, "evt_123");
        assert_eq!(payment.reference, "pi_42");
        assert_eq!(payment.invoice_id, Some(invoice_id));
        assert_eq!(payment.payment_token.as_deref(), Some("tok"));
        assert_eq!(payment.amount_cents, Some(12000));
    }

    #[test]
    fn unpaid_checkout_session_is_ignored() {
        let body = json!({
            "id": "evt_124",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1", "payment_status": "unpaid" } }
        })
        .to_string();
        assert!(parse_stripe_event(body.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn payment_intent_falls_back_to_client_reference() {
        let invoice_id = Uuid::new_v4();
        let body = json!({
            "id": "evt_125",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_7",
                "amount_received": 5000,
                "client_reference_id": invoice_id.to_string()
            }}
        })
        .to_string();

        let payment = parse_stripe_event(body.as_bytes()).unwrap().unwrap();
        assert_eq!(payment.reference, "pi_7");
        assert_eq!(payment.invoice_id, Some(invoice_id));
        assert_eq!(payment.payment_token, None);
    }

    #[test]
    fn unrelated_stripe_events_are_ignored() {
        let body = json!({
            "id": "evt_126",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } }
        })
        .to_string();
        assert!(parse_stripe_event(body.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn malformed_invoice_id_is_rejected() {
        let body = json!({
            "id": "evt_127",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_8", "metadata": { "invoice_id": "FAC-2026-0001" } } }
        })
        .to_string();
        assert!(parse_stripe_event(body.as_bytes()).is_err());
    }

    #[test]
    fn parses_paddle_transaction_completed() {
        let invoice_id = Uuid::new_v4();
        let body = json!({
            "event_id": "evt_01h",
            "event_type": "transaction.completed",
            "data": {
                "id": "txn_01h",
                "custom_data": { "invoice_id": invoice_id.to_string() },
                "details": { "totals": { "grand_total": "24000" } }
            }
        })
        .to_string();

        let payment = parse_paddle_event(body.as_bytes()).unwrap().unwrap();
        assert_eq!(payment.provider, PaymentProvider::Paddle);
        assert_eq!(payment.reference, "txn_01h");
        assert_eq!(payment.invoice_id, Some(invoice_id));
        assert_eq!(payment.amount_cents, Some(24000));
    }

    #[test]
    fn other_paddle_events_are_ignored() {
        let body = json!({
            "event_id": "evt_02",
            "event_type": "subscription.created",
            "data": {}
        })
        .to_string();
        assert!(parse_paddle_event(body.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn garbage_body_is_invalid_request() {
        assert!(matches!(
            parse_stripe_event(b"not json"),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
