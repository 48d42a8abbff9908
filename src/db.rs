//! Database connection pool and migration management.
//!
//! This module provides utilities for:
//! - Creating and managing a PostgreSQL connection pool
//! - Running database migrations automatically

use sqlx::{Pool, Postgres};

/// Type alias for PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create a new PostgreSQL connection pool.
///
/// A connection pool maintains multiple database connections that are reused across HTTP requests.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection string is invalid
/// - Cannot connect to PostgreSQL server
/// - Database authentication fails
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations from the `migrations/` directory.
///
/// Migrations are tracked in the `_sqlx_migrations` table, so each migration runs only once.
///
/// # Errors
///
/// Returns an error if a migration file cannot be applied.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    // The macro reads migrations at compile time from ./migrations directory
    sqlx::migrate!("./migrations").run(pool).await
}

/// Rows the database tests build on.
#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::DbPool;
    use crate::{
        config::test_config,
        models::invoice::{CreateInvoiceItemRequest, CreateInvoiceRequest, Invoice, InvoiceStatus},
        services::{
            invoice_service,
            secrets::{generate_secret, hash_secret},
        },
    };

    pub async fn user(pool: &DbPool, email: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO users (email, company_name, api_key_hash) VALUES ($1, 'Atelier Dupont', $2) RETURNING id",
        )
        .bind(email)
        .bind(hash_secret(&generate_secret()))
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn client(pool: &DbPool, user_id: Uuid, name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO clients (user_id, name) VALUES ($1, $2) RETURNING id")
            .bind(user_id)
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    /// One 100 € line at 20 %: 120 € TTC.
    pub fn invoice_request(
        client_id: Uuid,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
    ) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            client_id,
            issue_date: Some(issue_date),
            due_date,
            items: vec![CreateInvoiceItemRequest {
                description: "Prestation".to_string(),
                quantity: 1.0,
                unit_price_cents: 10_000,
                vat_rate: 20.0,
            }],
            notes: None,
        }
    }

    /// Create an invoice and move it to `status` (draft, sent or cancelled).
    pub async fn invoice(
        pool: &DbPool,
        user_id: Uuid,
        client_id: Uuid,
        due_date: NaiveDate,
        status: InvoiceStatus,
    ) -> Invoice {
        let issue_date = due_date - chrono::Duration::days(30);
        let (invoice, _) = invoice_service::create_invoice(
            pool,
            &test_config(),
            user_id,
            invoice_request(client_id, issue_date, Some(due_date)),
            issue_date,
        )
        .await
        .unwrap();

        match status {
            InvoiceStatus::Draft => invoice,
            InvoiceStatus::Sent => {
                invoice_service::transition_invoice(pool, user_id, invoice.id, InvoiceStatus::Sent)
                    .await
                    .unwrap()
            }
            InvoiceStatus::Cancelled => invoice_service::transition_invoice(
                pool,
                user_id,
                invoice.id,
                InvoiceStatus::Cancelled,
            )
            .await
            .unwrap(),
            other => panic!("fixture cannot create {other} invoices"),
        }
    }

    pub async fn status_of(pool: &DbPool, invoice_id: Uuid) -> InvoiceStatus {
        sqlx::query_scalar("SELECT status FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }
}
