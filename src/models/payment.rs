//! Payment, payment link and provider event models.
//!
//! # Payment Flow
//!
//! 1. The user creates a payment link for a sent invoice
//! 2. The payer opens the hosted page, which resolves the token
//! 3. The provider (Stripe or Paddle) calls our webhook once the payment succeeds
//! 4. The invoice is settled, the payment recorded and the link consumed

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;

/// Where a payment came from. Stored as the `payment_provider` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Paddle,
    /// Bank transfer or cheque recorded by the user.
    Manual,
}

impl PaymentProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paddle => "paddle",
            PaymentProvider::Manual => "manual",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a payment record from the `payments` table.
///
/// An invoice has at most one payment (enforced by a UNIQUE constraint).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub provider: PaymentProvider,
    pub provider_reference: String,
    pub amount_cents: i64,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Response of `POST /api/invoices/{id}/payment-link`.
///
/// ```json
/// {
///   "url": "https://app.example.fr/pay/9f86d0...",
///   "token": "9f86d0...",
///   "expires_at": "2026-04-30T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PaymentLinkResponse {
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// What an unauthenticated payer sees for a token (`GET /api/payment/{token}`).
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PublicInvoiceView {
    pub invoice_id: Uuid,
    pub number: String,
    pub company_name: String,
    pub client_name: String,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub currency: String,
    pub total_ttc_cents: i64,
    pub expires_at: DateTime<Utc>,
}

/// A successful payment reported by a provider webhook, normalized across providers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayment {
    pub provider: PaymentProvider,

    /// Provider event id, used for idempotency.
    pub event_id: String,
    pub event_type: String,

    /// Provider-side payment reference (payment intent, transaction id).
    pub reference: String,
    pub invoice_id: Option<Uuid>,
    pub payment_token: Option<String>,
    pub amount_cents: Option<i64>,
}

/// Result of settling an invoice.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Payment recorded and invoice marked paid.
    Settled { payment: Payment },

    /// The invoice was already paid; nothing changed.
    AlreadyPaid { invoice_id: Uuid },

    /// This provider event was processed before.
    DuplicateEvent,
}

/// Acknowledgement returned to payment providers.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SettlementOutcome>,
}
