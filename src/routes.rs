//! HTTP route table.
//!
//! Public routes: health, registration, the payment page and provider
//! webhooks. Everything else under `/api` requires `Authorization: Bearer`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // The hosted payment page is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authenticated_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        // Clients
        .route(
            "/api/clients",
            post(handlers::clients::create_client).get(handlers::clients::list_clients),
        )
        // Invoices
        .route(
            "/api/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route("/api/invoices/{id}", get(handlers::invoices::get_invoice))
        .route(
            "/api/invoices/{id}/send",
            post(handlers::invoices::send_invoice),
        )
        .route(
            "/api/invoices/{id}/cancel",
            post(handlers::invoices::cancel_invoice),
        )
        .route(
            "/api/invoices/{id}/payments",
            post(handlers::invoices::record_payment),
        )
        .route(
            "/api/invoices/{id}/payment-link",
            post(handlers::invoices::create_payment_link),
        )
        // Dashboard and reports
        .route(
            "/api/dashboard/summary",
            get(handlers::dashboard::summary),
        )
        .route(
            "/api/dashboard/revenue",
            get(handlers::dashboard::revenue),
        )
        .route(
            "/api/dashboard/status-distribution",
            get(handlers::dashboard::status_distribution),
        )
        .route("/api/reports/tva", get(handlers::reports::tva_report))
        .route("/api/ask", post(handlers::ask::ask))
        .route(
            "/api/reminders/run",
            post(handlers::reminders::run_reminders),
        )
        // Outbound webhooks
        .route(
            "/api/webhooks",
            post(handlers::webhooks::create_webhook).get(handlers::webhooks::list_webhooks),
        )
        .route(
            "/api/webhooks/{id}",
            delete(handlers::webhooks::delete_webhook),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.pool.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/auth/register", post(handlers::auth::register))
        .route(
            "/api/payment/{token}",
            get(handlers::payments::get_payment_page),
        )
        .route(
            "/api/payment/webhooks/stripe",
            post(handlers::payments::stripe_webhook),
        )
        .route(
            "/api/payment/webhooks/paddle",
            post(handlers::payments::paddle_webhook),
        )
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::test_config, services::secrets::hmac_sha256_hex};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// Router over a pool that never connects; only paths rejected before
    /// any query can be exercised.
    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/facturation_test")
            .unwrap();
        router(AppState::new(pool, test_config()))
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn protected_routes_require_api_key() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/invoices")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "invalid_api_key");
    }

    #[tokio::test]
    async fn non_bearer_authorization_is_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/dashboard/summary")
                    .header("Authorization", "Basic dXNlcjpwYXNz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_payment_token_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/payment/not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_code(response).await, "payment_link_not_found");
    }

    #[tokio::test]
    async fn stripe_webhook_without_signature_is_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payment/webhooks/stripe")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "invalid_signature");
    }

    #[tokio::test]
    async fn stripe_webhook_with_wrong_signature_is_rejected() {
        let now = Utc::now().timestamp();
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payment/webhooks/stripe")
                    .header("Stripe-Signature", format!("t={now},v1={}", "0".repeat(64)))
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signed_unhandled_stripe_event_is_acknowledged() {
        let body = r#"{"id":"evt_1","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        let now = Utc::now().timestamp();
        let signature = hmac_sha256_hex(b"whsec_test", format!("{now}.{body}").as_bytes());

        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payment/webhooks/stripe")
                    .header("Stripe-Signature", format!("t={now},v1={signature}"))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let ack: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ack["received"], true);
        assert_eq!(ack["handled"], false);
    }

    #[tokio::test]
    async fn paddle_webhook_without_secret_is_unavailable() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payment/webhooks/paddle")
                    .header("Paddle-Signature", "ts=1;h1=abc")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn registration_validates_before_touching_the_database() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/register")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"email":"nope","company_name":"Atelier"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
