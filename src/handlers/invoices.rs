//! Invoice HTTP handlers.
//!
//! This module implements the invoice lifecycle endpoints:
//! - POST /api/invoices - Create a draft invoice with its lines
//! - GET /api/invoices - List invoices (filters: status, client_id, from, to)
//! - GET /api/invoices/{id} - Invoice with its lines
//! - POST /api/invoices/{id}/send - draft -> sent
//! - POST /api/invoices/{id}/cancel - draft/sent/overdue -> cancelled
//! - POST /api/invoices/{id}/payments - Record a manual payment
//! - POST /api/invoices/{id}/payment-link - Issue a payment link

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        invoice::{
            CreateInvoiceRequest, InvoiceDetailResponse, InvoiceFilter, InvoiceResponse,
            InvoiceStatus, ManualPaymentRequest,
        },
        payment::{PaymentLinkResponse, SettlementOutcome},
        webhook::InvoiceEvent,
    },
    services::{dashboard_service, invoice_service, payment_service, webhook_service},
};

/// Create a draft invoice.
///
/// # Request Body
///
/// ```json
/// {
///   "client_id": "550e8400-...",
///   "issue_date": "2026-03-02",
///   "items": [
///     { "description": "Développement", "quantity": 3, "unit_price_cents": 45000, "vat_rate": 20 }
///   ]
/// }
/// ```
///
/// # Response (201)
///
/// The invoice with its allocated number (`FAC-2026-0001`), totals and lines.
///
/// # Errors
///
/// - **400**: no lines, bad quantity/price/VAT rate, due date before issue date
/// - **404**: client not found
pub async fn create_invoice(
    State(pool): State<DbPool>,
    State(config): State<Arc<Config>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let today = dashboard_service::paris_today(Utc::now());
    let (invoice, items) =
        invoice_service::create_invoice(&pool, &config, auth.user_id, request, today).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceDetailResponse {
            invoice: invoice.into(),
            items,
        }),
    ))
}

/// List invoices, newest first.
///
/// `GET /api/invoices?status=sent&client_id=...&from=2026-01-01&to=2026-03-31`
pub async fn list_invoices(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let invoices = invoice_service::list_invoices(&pool, auth.user_id, &filter).await?;

    Ok(Json(invoices.into_iter().map(Into::into).collect()))
}

/// Invoice with its lines. 404 if it belongs to another user.
pub async fn get_invoice(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = invoice_service::get_invoice(&pool, auth.user_id, invoice_id).await?;
    let items = invoice_service::get_items(&pool, invoice.id).await?;

    Ok(Json(InvoiceDetailResponse {
        invoice: invoice.into(),
        items,
    }))
}

/// Mark a draft invoice as sent and emit `invoice.sent`.
///
/// # Errors
///
/// - **409**: invoice is not a draft
pub async fn send_invoice(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice =
        invoice_service::transition_invoice(&pool, auth.user_id, invoice_id, InvoiceStatus::Sent)
            .await?;

    tracing::info!(
        company = %auth.company_name,
        number = %invoice.number,
        "invoice sent"
    );
    webhook_service::dispatch_invoice_event(pool.clone(), invoice.clone(), InvoiceEvent::Sent, None);

    Ok(Json(invoice.into()))
}

/// Cancel an invoice that is not paid.
///
/// # Errors
///
/// - **409**: invoice is paid or already cancelled
pub async fn cancel_invoice(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = invoice_service::transition_invoice(
        &pool,
        auth.user_id,
        invoice_id,
        InvoiceStatus::Cancelled,
    )
    .await?;

    Ok(Json(invoice.into()))
}

/// Record a bank transfer or cheque.
///
/// # Request Body
///
/// ```json
/// { "amount_cents": 162000, "reference": "VIR-20260315" }
/// ```
///
/// Both fields are optional; the amount defaults to the invoice total.
///
/// # Errors
///
/// - **409**: invoice is a draft or cancelled
/// - **422**: amount lower than the invoice total
pub async fn record_payment(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
    body: Option<Json<ManualPaymentRequest>>,
) -> Result<Json<SettlementOutcome>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let outcome =
        payment_service::record_manual_payment(&pool, auth.user_id, invoice_id, request).await?;

    Ok(Json(outcome))
}

/// Issue a payment link for a sent or overdue invoice.
///
/// # Response (201)
///
/// ```json
/// {
///   "url": "https://app.example.fr/pay/3f2a...",
///   "token": "3f2a...",
///   "expires_at": "2026-04-14T09:00:00Z"
/// }
/// ```
pub async fn create_payment_link(
    State(pool): State<DbPool>,
    State(config): State<Arc<Config>>,
    Extension(auth): Extension<AuthContext>,
    Path(invoice_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PaymentLinkResponse>), AppError> {
    let link =
        payment_service::create_payment_link(&pool, &config, auth.user_id, invoice_id).await?;

    Ok((StatusCode::CREATED, Json(link)))
}
