//! HTTP middleware components.
//!
//! Middleware run before route handlers and can short-circuit
//! unauthorized requests.

/// API key authentication middleware
pub mod auth;
