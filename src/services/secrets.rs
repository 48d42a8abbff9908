//! Random secrets, hashing and HMAC helpers.
//!
//! API keys, payment tokens and webhook secrets are all 32 random bytes
//! rendered as 64 hex characters. API keys and payment tokens are only ever
//! stored as their SHA-256 digest.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Length of a generated secret in hex characters.
pub const SECRET_HEX_LEN: usize = 64;

/// Generate cryptographically secure random secret (64 hex characters).
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hex digest of an API key or payment token.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `value` has the shape of a generated secret.
pub fn is_secret_format(value: &str) -> bool {
    value.len() == SECRET_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// HMAC-SHA256 of `message`, hex encoded.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key length is valid");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex encoded HMAC-SHA256 signature.
pub fn verify_hmac_sha256_hex(key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key length is valid");
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}
