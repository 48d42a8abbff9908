//! Natural-language questions about the user's invoices.

use axum::{Extension, Json, extract::State};
use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    services::{
        dashboard_service,
        nl_query::{self, AskRequest, AskResponse},
    },
};

/// Answer a question such as "Combien me doit Boulangerie Dupont ?".
///
/// # Request Body
///
/// ```json
/// { "question": "Quel est mon chiffre d'affaires ce trimestre ?" }
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "question": "Quel est mon chiffre d'affaires ce trimestre ?",
///   "intent": { "type": "revenue", "period": { "from": "2026-01-01", "to": "2026-03-31", "label": "T1 2026" } },
///   "answer": "Chiffre d'affaires encaissé (T1 2026) : 8 400,00 € TTC, 7 000,00 € HT, sur 6 factures.",
///   "amount_cents": 840000,
///   "count": 6
/// }
/// ```
///
/// Questions that match no known pattern get an `unknown` intent and a hint,
/// not an error.
pub async fn ask(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let today = dashboard_service::paris_today(Utc::now());
    let response = nl_query::ask(&pool, auth.user_id, request.question, today).await?;

    Ok(Json(response))
}
