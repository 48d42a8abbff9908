//! Public payment endpoints.
//!
//! None of these routes use API key authentication:
//! - GET /api/payment/{token} - Invoice summary behind a payment link
//! - POST /api/payment/webhooks/stripe - Signed Stripe events
//! - POST /api/payment/webhooks/paddle - Signed Paddle Billing events
//!
//! Provider webhooks authenticate by HMAC over the raw body, so they take
//! `Bytes` rather than `Json` and parse only after the signature checks out.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use chrono::Utc;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::payment::{ProviderPayment, PublicInvoiceView, WebhookAck},
    services::{payment_service, provider_webhooks},
};

const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
const PADDLE_SIGNATURE_HEADER: &str = "Paddle-Signature";

/// Invoice summary for the hosted payment page.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "invoice_id": "550e8400-...",
///   "number": "FAC-2026-0007",
///   "company_name": "Atelier Martin",
///   "client_name": "Boulangerie Dupont",
///   "status": "sent",
///   "due_date": "2026-04-01",
///   "currency": "EUR",
///   "total_ttc_cents": 162000,
///   "expires_at": "2026-04-14T09:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - **404**: malformed or unknown token
/// - **410**: link used, invoice paid, or link expired
pub async fn get_payment_page(
    State(pool): State<DbPool>,
    Path(token): Path<String>,
) -> Result<Json<PublicInvoiceView>, AppError> {
    let view = payment_service::resolve_payment_link(&pool, &token, Utc::now()).await?;

    Ok(Json(view))
}

/// Stripe webhook receiver.
///
/// Handles `checkout.session.completed` and `payment_intent.succeeded`;
/// other event types are acknowledged with `"handled": false`.
///
/// # Errors
///
/// - **400**: missing, stale or wrong `Stripe-Signature`
/// - **503**: `STRIPE_WEBHOOK_SECRET` is not set
pub async fn stripe_webhook(
    State(pool): State<DbPool>,
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let secret = config
        .stripe_webhook_secret
        .as_deref()
        .ok_or(AppError::ProviderNotConfigured("stripe"))?;
    let signature = signature_header(&headers, STRIPE_SIGNATURE_HEADER)?;

    provider_webhooks::verify_stripe_signature(
        signature,
        &body,
        secret,
        Utc::now().timestamp(),
        config.webhook_tolerance_secs,
    )?;

    let payment = provider_webhooks::parse_stripe_event(&body)?;
    settle(&pool, payment).await
}

/// Paddle Billing webhook receiver. Only `transaction.completed` settles.
///
/// # Errors
///
/// - **400**: missing, stale or wrong `Paddle-Signature`
/// - **503**: `PADDLE_WEBHOOK_SECRET` is not set
pub async fn paddle_webhook(
    State(pool): State<DbPool>,
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let secret = config
        .paddle_webhook_secret
        .as_deref()
        .ok_or(AppError::ProviderNotConfigured("paddle"))?;
    let signature = signature_header(&headers, PADDLE_SIGNATURE_HEADER)?;

    provider_webhooks::verify_paddle_signature(
        signature,
        &body,
        secret,
        Utc::now().timestamp(),
        config.webhook_tolerance_secs,
    )?;

    let payment = provider_webhooks::parse_paddle_event(&body)?;
    settle(&pool, payment).await
}

fn signature_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)
}

async fn settle(
    pool: &DbPool,
    payment: Option<ProviderPayment>,
) -> Result<Json<WebhookAck>, AppError> {
    let Some(payment) = payment else {
        return Ok(Json(WebhookAck {
            received: true,
            handled: false,
            outcome: None,
        }));
    };

    tracing::info!(
        provider = %payment.provider,
        event_id = %payment.event_id,
        event_type = %payment.event_type,
        "provider payment event received"
    );

    let outcome = payment_service::settle_provider_payment(pool, &payment).await?;

    Ok(Json(WebhookAck {
        received: true,
        handled: true,
        outcome: Some(outcome),
    }))
}
