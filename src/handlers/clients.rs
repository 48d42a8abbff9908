//! Client HTTP handlers.
//!
//! - POST /api/clients - Create a client
//! - GET /api/clients - List the user's clients by name

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::client::{Client, CreateClientRequest},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

/// Trim optional text fields, dropping blanks.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Create a client.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Boulangerie Dupont",
///   "email": "contact@dupont.fr",
///   "address": "12 rue des Lilas, 69003 Lyon"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: the stored client
/// - **400**: empty name
pub async fn create_client(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateClientRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest(
            "Client name cannot be empty".to_string(),
        ));
    }

    let client = sqlx::query_as::<_, Client>(
        r#"
        INSERT INTO clients (user_id, name, email, siret, address)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(name)
    .bind(non_blank(request.email))
    .bind(non_blank(request.siret))
    .bind(non_blank(request.address))
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(client)))
}

/// List the authenticated user's clients, ordered by name.
pub async fn list_clients(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Client>>, AppError> {
    let clients = sqlx::query_as::<_, Client>(
        "SELECT * FROM clients WHERE user_id = $1 ORDER BY lower(name), created_at",
    )
    .bind(auth.user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(clients))
}
