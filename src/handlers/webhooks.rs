//! HTTP handlers for webhook endpoint management.
//!
//! Users register HTTPS endpoints that receive signed `invoice.sent`,
//! `invoice.paid` and `invoice.reminder_due` events.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::webhook::{WebhookEndpointRequest, WebhookEndpointResponse};
use crate::services::webhook_service;

/// Register a new webhook endpoint.
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://hooks.atelier-martin.fr/factures"
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the webhook endpoint details.
/// The `secret` is only returned once during creation.
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "url": "https://hooks.atelier-martin.fr/factures",
///   "secret": "a1b2c3d4e5f6...",
///   "is_active": true,
///   "created_at": "2026-01-15T10:30:00Z"
/// }
/// ```
///
/// # Validation
///
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - At most 2048 characters
///
/// Deliveries carry `X-Webhook-Signature: sha256=<hex>`, the HMAC-SHA256 of
/// the raw body keyed with `secret`.
pub async fn create_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WebhookEndpointRequest>,
) -> Result<impl IntoResponse, AppError> {
    let endpoint =
        webhook_service::create_webhook_endpoint(&pool, auth.user_id, request).await?;

    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// Active endpoints of the user, newest first. Secrets are never listed.
///
/// ```json
/// [
///   {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "url": "https://hooks.atelier-martin.fr/factures",
///     "is_active": true,
///     "created_at": "2026-01-15T10:30:00Z"
///   }
/// ]
/// ```
pub async fn list_webhooks(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<WebhookEndpointResponse>>, AppError> {
    let endpoints = webhook_service::list_webhook_endpoints(&pool, auth.user_id).await?;

    Ok(Json(endpoints))
}

/// Deactivate an endpoint. Returns 204 No Content.
///
/// Sets `is_active = false` so the delivery log stays intact.
/// Returns 404 if the endpoint is unknown or belongs to another user.
pub async fn delete_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(endpoint_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    webhook_service::delete_webhook_endpoint(&pool, auth.user_id, endpoint_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
