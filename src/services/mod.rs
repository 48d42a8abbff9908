//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and complex operations.

pub mod dashboard_service;
pub mod invoice_service;
pub mod nl_query;
pub mod payment_service;
pub mod provider_webhooks;
pub mod reminder_service;
pub mod report_service;
pub mod secrets;
pub mod webhook_service;
