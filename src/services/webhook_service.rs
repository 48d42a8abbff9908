//! Webhook service for managing endpoints and sending invoice events.
//!
//! This module handles webhook endpoint registration, event delivery,
//! and HMAC signature generation for secure webhook verification.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::invoice::Invoice;
use crate::models::webhook::{
    InvoiceEvent, WebhookEndpoint, WebhookEndpointRequest, WebhookEndpointResponse,
    WebhookPayload,
};
use crate::services::secrets::{generate_secret, hmac_sha256_hex};
use uuid::Uuid;

/// Create a new webhook endpoint.
///
/// # Process
///
/// 1. Validate URL format
/// 2. Generate cryptographically secure secret (32 bytes)
/// 3. Store endpoint in database
/// 4. Return endpoint with secret (only shown once)
pub async fn create_webhook_endpoint(
    pool: &DbPool,
    user_id: Uuid,
    request: WebhookEndpointRequest,
) -> Result<WebhookEndpointResponse, AppError> {
    validate_webhook_url(&request.url)?;

    let secret = generate_secret();

    let endpoint = sqlx::query_as::<_, WebhookEndpoint>(
        r#"
        INSERT INTO webhook_endpoints (user_id, url, secret)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&request.url)
    .bind(&secret)
    .fetch_one(pool)
    .await?;

    Ok(WebhookEndpointResponse::from(endpoint).with_secret(secret))
}

/// List all active webhook endpoints of a user. Secrets are not returned.
pub async fn list_webhook_endpoints(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<Vec<WebhookEndpointResponse>, AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE user_id = $1 AND is_active = true ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(endpoints.into_iter().map(|e| e.into()).collect())
}

/// Delete a webhook endpoint (soft delete, event history is kept).
pub async fn delete_webhook_endpoint(
    pool: &DbPool,
    user_id: Uuid,
    endpoint_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE webhook_endpoints SET is_active = false WHERE id = $1 AND user_id = $2 AND is_active = true",
    )
    .bind(endpoint_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::WebhookNotFound);
    }

    Ok(())
}

/// Deliver an invoice event in the background.
///
/// The caller's request never waits on, or fails because of, delivery.
pub fn dispatch_invoice_event(
    pool: DbPool,
    invoice: Invoice,
    event: InvoiceEvent,
    reminder_level: Option<i16>,
) {
    tokio::spawn(async move {
        if let Err(e) = notify_invoice_webhooks(&pool, &invoice, event, reminder_level).await {
            tracing::error!(
                invoice_id = %invoice.id,
                event = event.as_str(),
                "Failed to dispatch webhooks: {:?}",
                e
            );
        }
    });
}

/// Send an invoice event to all active endpoints of the invoice owner.
///
/// Individual delivery failures are logged and do not stop the others.
pub async fn notify_invoice_webhooks(
    pool: &DbPool,
    invoice: &Invoice,
    event: InvoiceEvent,
    reminder_level: Option<i16>,
) -> Result<(), AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE user_id = $1 AND is_active = true",
    )
    .bind(invoice.user_id)
    .fetch_all(pool)
    .await?;

    if endpoints.is_empty() {
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .map_err(|e| AppError::InvalidRequest(format!("HTTP client error: {}", e)))?;

    for endpoint in endpoints {
        if let Err(e) = send_webhook(pool, &client, &endpoint, invoice, event, reminder_level).await
        {
            tracing::error!("Failed to send webhook to {}: {:?}", endpoint.url, e);
        }
    }

    Ok(())
}

/// Send a single webhook with HMAC signature and record the attempt.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>`
/// - `X-Webhook-Event-Id: <uuid>`
async fn send_webhook(
    pool: &DbPool,
    client: &reqwest::Client,
    endpoint: &WebhookEndpoint,
    invoice: &Invoice,
    event: InvoiceEvent,
    reminder_level: Option<i16>,
) -> Result<(), AppError> {
    let event_id = Uuid::new_v4();

    let payload = WebhookPayload::new(event_id, event, invoice, reminder_level);
    let payload_value = serde_json::to_value(&payload)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to serialize payload: {}", e)))?;
    let payload_json = payload_value.to_string();

    let signature = generate_signature(&endpoint.secret, &payload_json);

    let response = client
        .post(&endpoint.url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Signature", &signature)
        .header("X-Webhook-Event-Id", event_id.to_string())
        .body(payload_json)
        .send()
        .await;

    let (status, body) = match response {
        Ok(resp) => {
            let status = resp.status().as_u16() as i32;
            let body = resp.text().await.ok();
            (Some(status), body)
        }
        Err(e) => {
            let error_msg = format!("Request failed: {}", e);
            tracing::warn!(endpoint_id = %endpoint.id, "{}", error_msg);
            (None, Some(error_msg))
        }
    };

    sqlx::query(
        r#"
        INSERT INTO webhook_events (
            id,
            webhook_endpoint_id,
            invoice_id,
            event_type,
            payload,
            response_status,
            response_body
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event_id)
    .bind(endpoint.id)
    .bind(invoice.id)
    .bind(event.as_str())
    .bind(payload_value)
    .bind(status)
    .bind(body)
    .execute(pool)
    .await?;

    Ok(())
}

/// Generate HMAC-SHA256 signature for webhook payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
fn generate_signature(secret: &str, payload: &str) -> String {
    format!(
        "sha256={}",
        hmac_sha256_hex(secret.as_bytes(), payload.as_bytes())
    )
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0")
            ) {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::secrets::verify_hmac_sha256_hex;

    #[test]
    fn https_urls_are_accepted() {
        assert!(validate_webhook_url("https://hooks.example.fr/factures").is_ok());
    }

    #[test]
    fn plain_http_only_for_local_hosts() {
        assert!(validate_webhook_url("http://localhost:8080/hook").is_ok());
        assert!(validate_webhook_url("http://127.0.0.1/hook").is_ok());
        assert!(validate_webhook_url("http://hooks.example.fr/hook").is_err());
        assert!(validate_webhook_url("ftp://example.fr/hook").is_err());
        assert!(validate_webhook_url("not a url").is_err());
    }

    #[test]
    fn overlong_urls_are_rejected() {
        let url = format!("https://example.fr/{}", "a".repeat(2048));
        assert!(matches!(
            validate_webhook_url(&url),
            Err(AppError::InvalidWebhookUrl(_))
        ));
    }

    #[test]
    fn signature_is_prefixed_hmac_of_body() {
        let signature = generate_signature("secret", "{\"a\":1}");
        let hex = signature.strip_prefix("sha256=").unwrap();
        assert!(verify_hmac_sha256_hex(b"secret", b"{\"a\":1}", hex));
    }
}
