//! Invoice data models and API request/response types.
//!
//! This module defines:
//! - `InvoiceStatus`: lifecycle status stored as the `invoice_status` Postgres enum
//! - `Invoice` / `InvoiceItem`: database entities
//! - Request and response bodies for the invoice endpoints
//!
//! # Amount Storage
//!
//! Every amount is stored as `i64` cents. VAT rates are stored in basis
//! points (`2000` = 20 %), so no floating-point value ever reaches a total.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an invoice.
///
/// ```text
/// draft ──► sent ──► paid
///   │        │  ▲
///   │        ▼  │
///   │      overdue
///   ▼        │
/// cancelled ◄┘ (from draft, sent or overdue)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// French label used in natural-language answers.
    pub fn label_fr(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "brouillon",
            InvoiceStatus::Sent => "envoyée",
            InvoiceStatus::Paid => "payée",
            InvoiceStatus::Overdue => "en retard",
            InvoiceStatus::Cancelled => "annulée",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Sent, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }

    /// Issued and not yet settled.
    pub fn is_outstanding(self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an invoice record from the `invoices` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,

    /// Sequential number, e.g. `FAC-2026-0042`. Unique per user.
    pub number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub total_ht_cents: i64,
    pub total_tva_cents: i64,
    pub total_ttc_cents: i64,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an invoice, from the `invoice_items` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub vat_rate_bp: i32,
    pub total_ht_cents: i64,
    pub total_tva_cents: i64,
}

/// Request body for `POST /api/invoices`.
///
/// ```json
/// {
///   "client_id": "550e8400-e29b-41d4-a716-446655440000",
///   "issue_date": "2026-03-01",
///   "items": [
///     { "description": "Développement", "quantity": 3, "unit_price_cents": 45000, "vat_rate": 20 }
///   ]
/// }
/// ```
///
/// `issue_date` defaults to today, `due_date` to the configured payment terms.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<CreateInvoiceItemRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceItemRequest {
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,

    /// VAT rate in percent: 0, 2.1, 5.5, 10 or 20.
    pub vat_rate: f64,
}

/// Query parameters for `GET /api/invoices`.
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Request body for `POST /api/invoices/{id}/payments`.
///
/// Without `amount_cents` the invoice total is assumed.
#[derive(Debug, Default, Deserialize)]
pub struct ManualPaymentRequest {
    pub amount_cents: Option<i64>,
    pub reference: Option<String>,
}

/// Invoice with its lines, returned by creation and `GET /api/invoices/{id}`.
#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    #[serde(flatten)]
    pub invoice: InvoiceResponse,
    pub items: Vec<InvoiceItem>,
}

/// Invoice as returned to API clients (owner id removed).
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub number: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub total_ht_cents: i64,
    pub total_tva_cents: i64,
    pub total_ttc_cents: i64,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            client_id: invoice.client_id,
            number: invoice.number,
            status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: invoice.currency,
            total_ht_cents: invoice.total_ht_cents,
            total_tva_cents: invoice.total_tva_cents,
            total_ttc_cents: invoice.total_ttc_cents,
            notes: invoice.notes,
            sent_at: invoice.sent_at,
            paid_at: invoice.paid_at,
            created_at: invoice.created_at,
        }
    }
}
