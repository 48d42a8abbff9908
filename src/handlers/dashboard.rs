//! Dashboard HTTP handlers.
//!
//! - GET /api/dashboard/summary
//! - GET /api/dashboard/revenue?months=12
//! - GET /api/dashboard/status-distribution

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::dashboard::{DashboardSummary, MonthlyRevenue, RevenueQuery, StatusBucket},
    services::dashboard_service,
};

/// Headline figures derived from the status distribution.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "invoiced_ttc_cents": 1254000,
///   "collected_ttc_cents": 840000,
///   "outstanding_ttc_cents": 414000,
///   "overdue_count": 2,
///   "overdue_ttc_cents": 174000,
///   "draft_count": 1,
///   "invoice_count": 14
/// }
/// ```
pub async fn summary(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(dashboard_service::summary(&pool, auth.user_id).await?))
}

/// Monthly revenue ending with the current month, oldest first.
///
/// `months` defaults to 12 and must be between 1 and 36.
pub async fn revenue(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Vec<MonthlyRevenue>>, AppError> {
    let today = dashboard_service::paris_today(Utc::now());
    let months =
        dashboard_service::monthly_revenue(&pool, auth.user_id, today, query.months).await?;

    Ok(Json(months))
}

/// Count and TTC amount for every status, zero-filled.
pub async fn status_distribution(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<StatusBucket>>, AppError> {
    Ok(Json(
        dashboard_service::status_distribution(&pool, auth.user_id).await?,
    ))
}
