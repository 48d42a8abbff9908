//! Liveness endpoint used by load balancers and uptime checks.

use crate::{db::DbPool, error::AppError};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Report service and database status.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "version": "0.1.0",
///   "timestamp": "2026-03-02T09:00:00Z"
/// }
/// ```
///
/// # Response (500 Internal Server Error)
///
/// If the database is unreachable the standard error body is returned.
pub async fn health_check(State(pool): State<DbPool>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    }))
}
