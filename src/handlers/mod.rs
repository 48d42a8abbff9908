//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Extracts the request (JSON body, path, query, auth context)
//! 2. Delegates to a service in `crate::services`
//! 3. Returns JSON or an `AppError`

pub mod ask;
pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod health;
pub mod invoices;
/// Public payment page and provider webhooks
pub mod payments;
pub mod reminders;
pub mod reports;
/// Outbound webhook endpoint management
pub mod webhooks;
