//! Reminder run trigger.

use axum::{Extension, Json, extract::State};
use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    services::{
        dashboard_service,
        reminder_service::{self, ReminderRunReport},
    },
};

/// Flag overdue invoices and log due reminders for the authenticated user.
///
/// Safe to call repeatedly: each reminder level is logged once per invoice.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "marked_overdue": 1,
///   "reminders_logged": 1,
///   "reminders": [
///     { "invoice_id": "550e8400-...", "number": "FAC-2026-0003", "level": 2, "days_overdue": 16 }
///   ]
/// }
/// ```
pub async fn run_reminders(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ReminderRunReport>, AppError> {
    let today = dashboard_service::paris_today(Utc::now());
    let report = reminder_service::run_reminders(&pool, auth.user_id, today).await?;

    Ok(Json(report))
}
