//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::invoice::InvoiceStatus;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Registration with an email that already has an account.
    #[error("Email already registered")]
    EmailTaken,

    #[error("Client not found")]
    ClientNotFound,

    /// Invoice does not exist or belongs to another user.
    #[error("Invoice not found")]
    InvoiceNotFound,

    #[error("Payment link not found")]
    PaymentLinkNotFound,

    #[error("Payment link has expired")]
    PaymentLinkExpired,

    #[error("Payment link has already been used")]
    PaymentLinkUsed,

    #[error("Webhook not found")]
    WebhookNotFound,

    /// Requested status change is not allowed from the current status.
    #[error("Cannot move invoice from {from} to {to}")]
    InvalidStatusTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// Payment received for less than the invoice total.
    #[error("Payment of {received_cents} cents does not cover invoice total of {expected_cents} cents")]
    AmountMismatch {
        expected_cents: i64,
        received_cents: i64,
    },

    /// The provider payment reference is already recorded on another invoice.
    #[error("Payment reference already recorded")]
    DuplicatePayment,

    /// Provider webhook signature missing, malformed, stale or wrong.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// No signing secret configured for the provider that called us.
    #[error("Payment provider {0} is not configured")]
    ProviderNotConfigured(&'static str),

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    /// Request body or parameters are invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::EmailTaken => (StatusCode::CONFLICT, "email_taken", self.to_string()),
            AppError::ClientNotFound => {
                (StatusCode::NOT_FOUND, "client_not_found", self.to_string())
            }
            AppError::InvoiceNotFound => {
                (StatusCode::NOT_FOUND, "invoice_not_found", self.to_string())
            }
            AppError::PaymentLinkNotFound => (
                StatusCode::NOT_FOUND,
                "payment_link_not_found",
                self.to_string(),
            ),
            AppError::PaymentLinkExpired => {
                (StatusCode::GONE, "payment_link_expired", self.to_string())
            }
            AppError::PaymentLinkUsed => (StatusCode::GONE, "payment_link_used", self.to_string()),
            AppError::WebhookNotFound => {
                (StatusCode::NOT_FOUND, "webhook_not_found", self.to_string())
            }
            AppError::InvalidStatusTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_status_transition",
                self.to_string(),
            ),
            AppError::AmountMismatch { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "amount_mismatch",
                self.to_string(),
            ),
            AppError::DuplicatePayment => (
                StatusCode::CONFLICT,
                "duplicate_payment",
                self.to_string(),
            ),
            AppError::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::ProviderNotConfigured(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_not_configured",
                self.to_string(),
            ),
            AppError::InvalidWebhookUrl(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_webhook_url",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::InvalidApiKey.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::PaymentLinkUsed.into_response().status(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::InvalidStatusTransition {
                from: InvoiceStatus::Paid,
                to: InvoiceStatus::Cancelled,
            }
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::DuplicatePayment.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ProviderNotConfigured("paddle")
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn transition_message_names_both_statuses() {
        let err = AppError::InvalidStatusTransition {
            from: InvoiceStatus::Draft,
            to: InvoiceStatus::Paid,
        };
        assert_eq!(err.to_string(), "Cannot move invoice from draft to paid");
    }
}
