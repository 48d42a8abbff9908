//! Data models representing database entities and API bodies.

/// Client (customer) model
pub mod client;
/// Dashboard and report response types
pub mod dashboard;
/// Invoice, invoice item and status model
pub mod invoice;
/// Payments, payment links and provider events
pub mod payment;
/// User (API key holder) model
pub mod user;
/// Outbound webhook endpoints and events
pub mod webhook;
