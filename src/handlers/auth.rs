//! Registration and profile HTTP handlers.
//!
//! - POST /api/auth/register - Create a user and issue its API key (public)
//! - GET /api/auth/me - Profile of the authenticated user

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::user::{RegisterRequest, RegisterResponse, User, UserResponse},
    services::secrets::{generate_secret, hash_secret},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

/// Check and normalize a registration request.
fn validate_registration(mut request: RegisterRequest) -> Result<RegisterRequest, AppError> {
    request.email = request.email.trim().to_lowercase();
    request.company_name = request.company_name.trim().to_string();

    let valid_email = request
        .email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AppError::InvalidRequest(
            "A valid email address is required".to_string(),
        ));
    }
    if request.company_name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Company name cannot be empty".to_string(),
        ));
    }

    request.siret = request
        .siret
        .map(|s| s.split_whitespace().collect::<String>())
        .filter(|s| !s.is_empty());
    let bad_siret = request
        .siret
        .as_ref()
        .is_some_and(|s| s.len() != 14 || !s.chars().all(|c| c.is_ascii_digit()));
    if bad_siret {
        return Err(AppError::InvalidRequest(
            "SIRET must be 14 digits".to_string(),
        ));
    }

    Ok(request)
}

/// Register a new user.
///
/// # Request Body
///
/// ```json
/// {
///   "email": "compta@atelier-martin.fr",
///   "company_name": "Atelier Martin",
///   "siret": "73282932000074"
/// }
/// ```
///
/// # Response (201)
///
/// The `api_key` is returned only here; the server keeps its SHA-256 hash.
///
/// ```json
/// {
///   "id": "550e8400-...",
///   "email": "compta@atelier-martin.fr",
///   "company_name": "Atelier Martin",
///   "api_key": "9f86d081884c7d65..."
/// }
/// ```
///
/// # Errors
///
/// - **409**: email already registered
pub async fn register(
    State(pool): State<DbPool>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request = validate_registration(request)?;
    let api_key = generate_secret();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, company_name, siret, vat_number, api_key_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, company_name, siret, vat_number, api_key_hash, is_active, created_at
        "#,
    )
    .bind(&request.email)
    .bind(&request.company_name)
    .bind(&request.siret)
    .bind(&request.vat_number)
    .bind(hash_secret(&api_key))
    .fetch_one(&pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::EmailTaken,
        other => AppError::Database(other),
    })?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            api_key,
        }),
    ))
}

/// Profile of the authenticated user.
pub async fn me(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, company_name, siret, vat_number, api_key_hash, is_active, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, company: &str, siret: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            company_name: company.to_string(),
            siret: siret.map(str::to_string),
            vat_number: None,
        }
    }

    #[test]
    fn email_and_company_are_normalized() {
        let req = validate_registration(request(
            "  Compta@Atelier-Martin.FR ",
            " Atelier Martin ",
            Some("732 829 320 00074"),
        ))
        .unwrap();
        assert_eq!(req.email, "compta@atelier-martin.fr");
        assert_eq!(req.company_name, "Atelier Martin");
        assert_eq!(req.siret.as_deref(), Some("73282932000074"));
    }

    #[test]
    fn malformed_registrations_are_rejected() {
        assert!(validate_registration(request("no-at-sign", "Atelier", None)).is_err());
        assert!(validate_registration(request("a@b.fr", "   ", None)).is_err());
        assert!(validate_registration(request("a@b.fr", "Atelier", Some("1234"))).is_err());
    }

    #[test]
    fn blank_siret_is_dropped() {
        let req = validate_registration(request("a@b.fr", "Atelier", Some("  "))).unwrap();
        assert_eq!(req.siret, None);
    }
}
