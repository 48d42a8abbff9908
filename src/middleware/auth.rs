//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and look up the owning user
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401

use crate::{db::DbPool, error::AppError, models::user::User, services::secrets::hash_secret};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>`; every query they run
/// is scoped to `user_id`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub company_name: String,
}

/// Extract the key from an `Authorization: Bearer <key>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Query `users` for a matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::InvalidApiKey)?;

    let key_hash = hash_secret(api_key);

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, company_name, siret, vat_number, api_key_hash, is_active, created_at
         FROM users
         WHERE api_key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    request.extensions_mut().insert(AuthContext {
        user_id: user.id,
        company_name: user.company_name,
    });

    Ok(next.run(request).await)
}
