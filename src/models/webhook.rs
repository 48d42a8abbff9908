//! Outbound webhook models for endpoint registration and event delivery.
//!
//! # Webhook Flow
//!
//! 1. A user registers an endpoint via `POST /api/webhooks`
//! 2. The system generates a secret for HMAC signature verification
//! 3. When an invoice is sent, paid or falls due for a reminder, a signed payload is posted
//! 4. The receiver verifies the signature using the secret
//!
//! Email delivery is not part of this service; these events are the hook
//! for whatever mails reminders on the user's side.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::invoice::{Invoice, InvoiceStatus};

/// Webhook endpoint registered by a user.
///
/// The `secret` is stored in plaintext (required for HMAC generation)
/// but never returned in list operations.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new webhook endpoint.
///
/// ```json
/// {
///   "url": "https://example.com/webhook"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct WebhookEndpointRequest {
    pub url: String,
}

/// Response when registering or listing webhook endpoints.
///
/// The `secret` field is only included when creating a new endpoint.
#[derive(Debug, Serialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            secret: None,
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl WebhookEndpointResponse {
    /// Create response with secret included (only for registration).
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// Invoice lifecycle events pushed to webhook endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceEvent {
    Sent,
    Paid,
    ReminderDue,
}

impl InvoiceEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceEvent::Sent => "invoice.sent",
            InvoiceEvent::Paid => "invoice.paid",
            InvoiceEvent::ReminderDue => "invoice.reminder_due",
        }
    }
}

/// Webhook payload sent to the registered endpoint.
///
/// ```json
/// {
///   "event_type": "invoice.paid",
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "created_at": "2026-01-15T10:30:00Z",
///   "data": {
///     "invoice": { "id": "...", "number": "FAC-2026-0001", "status": "paid", ... }
///   }
/// }
/// ```
///
/// The request carries `X-Webhook-Signature: sha256=<hex>`, the
/// HMAC-SHA256 of the JSON body keyed with the endpoint secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event_type: String,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: WebhookData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookData {
    pub invoice: InvoiceWebhookData,

    /// Reminder level (1 to 3) for `invoice.reminder_due`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_level: Option<i16>,
}

/// Subset of the invoice relevant for webhook consumers.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceWebhookData {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub total_ttc_cents: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Invoice> for InvoiceWebhookData {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id,
            number: invoice.number.clone(),
            client_id: invoice.client_id,
            status: invoice.status,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: invoice.currency.clone(),
            total_ttc_cents: invoice.total_ttc_cents,
            paid_at: invoice.paid_at,
        }
    }
}

impl WebhookPayload {
    pub fn new(
        event_id: Uuid,
        event: InvoiceEvent,
        invoice: &Invoice,
        reminder_level: Option<i16>,
    ) -> Self {
        Self {
            event_type: event.as_str().to_string(),
            event_id,
            created_at: Utc::now(),
            data: WebhookData {
                invoice: invoice.into(),
                reminder_level,
            },
        }
    }
}
