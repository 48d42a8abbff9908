//! Tax report HTTP handlers.

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::dashboard::{TvaReport, TvaReportQuery},
    services::report_service,
};

/// TVA collected over a period, per rate.
///
/// # Endpoint
///
/// `GET /api/reports/tva?from=2026-01-01&to=2026-03-31&basis=encaissements`
///
/// `basis` is `debits` (default, by issue date) or `encaissements`
/// (by payment date).
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "from": "2026-01-01",
///   "to": "2026-03-31",
///   "basis": "debits",
///   "rows": [
///     { "vat_rate_bp": 550, "base_ht_cents": 20000, "tva_cents": 1100, "line_count": 2 },
///     { "vat_rate_bp": 2000, "base_ht_cents": 135000, "tva_cents": 27000, "line_count": 3 }
///   ],
///   "total_base_ht_cents": 155000,
///   "total_tva_cents": 28100,
///   "invoice_count": 4
/// }
/// ```
pub async fn tva_report(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TvaReportQuery>,
) -> Result<Json<TvaReport>, AppError> {
    let report = report_service::tva_report(&pool, auth.user_id, &query).await?;

    Ok(Json(report))
}
