//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `PUBLIC_BASE_URL` (optional): origin of the hosted payment page
/// - `PAYMENT_LINK_TTL_HOURS` (optional): payment link lifetime, defaults to 720
/// - `PAYMENT_TERMS_DAYS` (optional): default due date offset, defaults to 30
/// - `INVOICE_NUMBER_PREFIX` (optional): defaults to `FAC`
/// - `STRIPE_WEBHOOK_SECRET` / `PADDLE_WEBHOOK_SECRET` (optional): provider signing secrets
/// - `WEBHOOK_TOLERANCE_SECS` (optional): accepted clock skew on signed webhooks, defaults to 300
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_payment_link_ttl_hours")]
    pub payment_link_ttl_hours: i64,

    #[serde(default = "default_payment_terms_days")]
    pub payment_terms_days: i64,

    #[serde(default = "default_invoice_number_prefix")]
    pub invoice_number_prefix: String,

    pub stripe_webhook_secret: Option<String>,

    pub paddle_webhook_secret: Option<String>,

    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_public_base_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_payment_link_ttl_hours() -> i64 {
    720
}

fn default_payment_terms_days() -> i64 {
    30
}

fn default_invoice_number_prefix() -> String {
    "FAC".to_string()
}

fn default_webhook_tolerance_secs() -> i64 {
    300
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Public URL of the hosted payment page for a token.
    pub fn payment_url(&self, token: &str) -> String {
        format!("{}/pay/{}", self.public_base_url.trim_end_matches('/'), token)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/facturation_test".to_string(),
        server_port: default_port(),
        database_max_connections: 1,
        public_base_url: "https://app.example.fr/".to_string(),
        payment_link_ttl_hours: default_payment_link_ttl_hours(),
        payment_terms_days: default_payment_terms_days(),
        invoice_number_prefix: default_invoice_number_prefix(),
        stripe_webhook_secret: Some("whsec_test".to_string()),
        paddle_webhook_secret: None,
        webhook_tolerance_secs: default_webhook_tolerance_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let vars = vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/factures".to_string(),
        )];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.payment_link_ttl_hours, 720);
        assert_eq!(config.payment_terms_days, 30);
        assert_eq!(config.invoice_number_prefix, "FAC");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert!(config.stripe_webhook_secret.is_none());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let vars: Vec<(String, String)> = vec![("SERVER_PORT".to_string(), "8080".to_string())];
        assert!(envy::from_iter::<_, Config>(vars).is_err());
    }

    #[test]
    fn payment_url_strips_trailing_slash() {
        let config = test_config();
        assert_eq!(
            config.payment_url("abc"),
            "https://app.example.fr/pay/abc"
        );
    }
}
