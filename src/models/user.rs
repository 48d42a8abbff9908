//! User model for authentication and ownership.
//!
//! A user is the invoicing business. Its API key is stored as a SHA-256 hash
//! and every client, invoice and webhook endpoint hangs off its id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a user record from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub company_name: String,
    pub siret: Option<String>,
    pub vat_number: Option<String>,

    /// SHA-256 hash of the bearer API key (64 hex characters)
    pub api_key_hash: String,

    /// Inactive users are rejected during authentication.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/auth/register`.
///
/// ```json
/// {
///   "email": "compta@atelier-martin.fr",
///   "company_name": "Atelier Martin",
///   "siret": "73282932000074"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub company_name: String,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
}

/// Profile returned by `GET /api/auth/me`.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub company_name: String,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            company_name: user.company_name,
            siret: user.siret,
            vat_number: user.vat_number,
            created_at: user.created_at,
        }
    }
}

/// Registration response. The API key is only ever shown here.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub api_key: String,
}
