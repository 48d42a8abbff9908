//! Payment service - payment links and invoice settlement.
//!
//! This service handles:
//! - Issuing single-use payment link tokens
//! - Resolving a token for the unauthenticated payment page
//! - Settling an invoice from a provider webhook or a manual payment
//!
//! # Atomicity Guarantees
//!
//! Settlement happens in one PostgreSQL transaction: the provider event is
//! recorded, the invoice row is locked `FOR UPDATE`, the payment inserted,
//! the invoice marked paid and its links consumed. A failure anywhere rolls
//! the whole thing back, including the event record, so the provider retry
//! is processed again.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{
        invoice::{Invoice, InvoiceStatus, ManualPaymentRequest},
        payment::{
            Payment, PaymentLinkResponse, PaymentProvider, ProviderPayment, PublicInvoiceView,
            SettlementOutcome,
        },
        webhook::InvoiceEvent,
    },
    services::{
        invoice_service::{get_invoice, lock_invoice},
        secrets::{generate_secret, hash_secret, is_secret_format},
        webhook_service,
    },
};

/// Issue a payment link for a sent or overdue invoice.
///
/// The token is returned once; only its SHA-256 is stored.
pub async fn create_payment_link(
    pool: &DbPool,
    config: &Config,
    user_id: Uuid,
    invoice_id: Uuid,
) -> Result<PaymentLinkResponse, AppError> {
    let invoice = get_invoice(pool, user_id, invoice_id).await?;
    if !invoice.status.is_outstanding() {
        return Err(AppError::InvalidStatusTransition {
            from: invoice.status,
            to: InvoiceStatus::Paid,
        });
    }

    let token = generate_secret();
    let expires_at = link_expiry(Utc::now(), config.payment_link_ttl_hours)?;

    sqlx::query(
        r#"
        INSERT INTO payment_links (invoice_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(invoice.id)
    .bind(hash_secret(&token))
    .bind(expires_at)
    .execute(pool)
    .await?;

    tracing::info!(invoice_id = %invoice.id, %expires_at, "payment link created");

    Ok(PaymentLinkResponse {
        url: config.payment_url(&token),
        token,
        expires_at,
    })
}

/// Expiry of a link issued at `now`.
pub fn link_expiry(now: DateTime<Utc>, ttl_hours: i64) -> Result<DateTime<Utc>, AppError> {
    Duration::try_hours(ttl_hours)
        .filter(|ttl| *ttl > Duration::zero())
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            AppError::InvalidRequest(format!("Payment link lifetime of {ttl_hours} hours is out of range"))
        })
}

/// Whether a link can still be used to pay.
pub fn check_link_usable(
    used_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    status: InvoiceStatus,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if used_at.is_some() || status == InvoiceStatus::Paid {
        return Err(AppError::PaymentLinkUsed);
    }
    if status == InvoiceStatus::Cancelled {
        return Err(AppError::PaymentLinkNotFound);
    }
    if expires_at <= now {
        return Err(AppError::PaymentLinkExpired);
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct PaymentLinkRow {
    used_at: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    view: PublicInvoiceView,
}

/// Resolve a token for the public payment page.
pub async fn resolve_payment_link(
    pool: &DbPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<PublicInvoiceView, AppError> {
    if !is_secret_format(token) {
        return Err(AppError::PaymentLinkNotFound);
    }

    let row = sqlx::query_as::<_, PaymentLinkRow>(
        r#"
        SELECT pl.used_at,
               pl.expires_at,
               i.id AS invoice_id,
               i.number,
               u.company_name,
               c.name AS client_name,
               i.status,
               i.due_date,
               i.currency,
               i.total_ttc_cents
        FROM payment_links pl
        JOIN invoices i ON i.id = pl.invoice_id
        JOIN users u ON u.id = i.user_id
        JOIN clients c ON c.id = i.client_id
        WHERE pl.token_hash = $1
        "#,
    )
    .bind(hash_secret(token))
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::PaymentLinkNotFound)?;

    check_link_usable(row.used_at, row.view.expires_at, row.view.status, now)?;

    Ok(row.view)
}

/// Settle the invoice referenced by a verified provider webhook.
pub async fn settle_provider_payment(
    pool: &DbPool,
    payment: &ProviderPayment,
) -> Result<SettlementOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let recorded = sqlx::query(
        r#"
        INSERT INTO provider_events (provider, event_id, event_type)
        VALUES ($1, $2, $3)
        ON CONFLICT (provider, event_id) DO NOTHING
        "#,
    )
    .bind(payment.provider)
    .bind(&payment.event_id)
    .bind(&payment.event_type)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if recorded == 0 {
        tx.rollback().await?;
        tracing::info!(
            provider = %payment.provider,
            event_id = %payment.event_id,
            "duplicate provider event ignored"
        );
        return Ok(SettlementOutcome::DuplicateEvent);
    }

    let invoice_id = resolve_invoice_reference(&mut tx, payment).await?;
    let invoice = lock_invoice(&mut tx, invoice_id, None).await?;
    let amount_cents = payment.amount_cents.unwrap_or(invoice.total_ttc_cents);

    let (outcome, paid_invoice) = settle_locked(
        &mut tx,
        &invoice,
        payment.provider,
        &payment.reference,
        amount_cents,
    )
    .await?;

    tx.commit().await?;

    if let Some(paid) = paid_invoice {
        webhook_service::dispatch_invoice_event(pool.clone(), paid, InvoiceEvent::Paid, None);
    }

    Ok(outcome)
}

/// Record a bank transfer or cheque entered by the user.
pub async fn record_manual_payment(
    pool: &DbPool,
    user_id: Uuid,
    invoice_id: Uuid,
    request: ManualPaymentRequest,
) -> Result<SettlementOutcome, AppError> {
    if request.amount_cents.is_some_and(|amount| amount < 0) {
        return Err(AppError::InvalidRequest(
            "Amount cannot be negative".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let invoice = lock_invoice(&mut tx, invoice_id, Some(user_id)).await?;
    let reference = request
        .reference
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| format!("manual-{}", Uuid::new_v4()));
    let amount_cents = request.amount_cents.unwrap_or(invoice.total_ttc_cents);

    let (outcome, paid_invoice) = settle_locked(
        &mut tx,
        &invoice,
        PaymentProvider::Manual,
        &reference,
        amount_cents,
    )
    .await?;

    tx.commit().await?;

    if let Some(paid) = paid_invoice {
        webhook_service::dispatch_invoice_event(pool.clone(), paid, InvoiceEvent::Paid, None);
    }

    Ok(outcome)
}

/// Find the invoice a provider payment refers to, via token or invoice id.
async fn resolve_invoice_reference(
    conn: &mut PgConnection,
    payment: &ProviderPayment,
) -> Result<Uuid, AppError> {
    let from_token = match &payment.payment_token {
        Some(token) if is_secret_format(token) => {
            sqlx::query_scalar::<_, Uuid>(
                "SELECT invoice_id FROM payment_links WHERE token_hash = $1",
            )
            .bind(hash_secret(token))
            .fetch_optional(&mut *conn)
            .await?
        }
        _ => None,
    };

    match (from_token, payment.invoice_id) {
        (Some(a), Some(b)) if a != b => Err(AppError::InvalidRequest(
            "Payment token and invoice id refer to different invoices".to_string(),
        )),
        (Some(id), _) | (None, Some(id)) => Ok(id),
        (None, None) if payment.payment_token.is_some() => Err(AppError::PaymentLinkNotFound),
        (None, None) => Err(AppError::InvalidRequest(
            "Payment metadata carries no invoice reference".to_string(),
        )),
    }
}

/// Settle a locked invoice. Returns the paid invoice when something changed.
async fn settle_locked(
    conn: &mut PgConnection,
    invoice: &Invoice,
    provider: PaymentProvider,
    reference: &str,
    amount_cents: i64,
) -> Result<(SettlementOutcome, Option<Invoice>), AppError> {
    if invoice.status == InvoiceStatus::Paid {
        tracing::warn!(
            invoice_id = %invoice.id,
            %provider,
            reference,
            "payment received for an invoice already paid"
        );
        return Ok((
            SettlementOutcome::AlreadyPaid {
                invoice_id: invoice.id,
            },
            None,
        ));
    }

    if !invoice.status.can_transition_to(InvoiceStatus::Paid) {
        return Err(AppError::InvalidStatusTransition {
            from: invoice.status,
            to: InvoiceStatus::Paid,
        });
    }

    if amount_cents < invoice.total_ttc_cents {
        return Err(AppError::AmountMismatch {
            expected_cents: invoice.total_ttc_cents,
            received_cents: amount_cents,
        });
    }

    let payment = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (invoice_id, provider, provider_reference, amount_cents)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(invoice.id)
    .bind(provider)
    .bind(reference)
    .bind(amount_cents)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::DuplicatePayment,
        other => AppError::Database(other),
    })?;

    let paid = sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices
        SET status = 'paid',
            paid_at = $2,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(invoice.id)
    .bind(payment.paid_at)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE payment_links SET used_at = NOW() WHERE invoice_id = $1 AND used_at IS NULL")
        .bind(invoice.id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(
        invoice_id = %invoice.id,
        number = %invoice.number,
        %provider,
        amount_cents,
        "invoice settled"
    );

    Ok((SettlementOutcome::Settled { payment }, Some(paid)))
}
