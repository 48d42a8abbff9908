//! Client data models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer of the invoicing business, from the `clients` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Client {
    pub id: Uuid,

    /// Owner of this client. Every query filters on it.
    #[serde(skip_serializing)]
    pub user_id: Uuid,

    pub name: String,
    pub email: Option<String>,
    pub siret: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a client.
///
/// ```json
/// {
///   "name": "Boulangerie Dupont",
///   "email": "contact@dupont.fr",
///   "address": "12 rue des Lilas, 69003 Lyon"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub email: Option<String>,
    pub siret: Option<String>,
    pub address: Option<String>,
}
