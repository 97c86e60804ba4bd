//! Authentication configuration.

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use warden_core::authz::TrustModel;

/// Configuration for token issuance, password policy and principal
/// resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Symmetric secret used to sign and verify tokens.
    pub secret_key: String,
    /// HMAC signing algorithm (default: HS256).
    pub algorithm: Algorithm,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 604_800 = 7 days).
    pub refresh_token_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before hashing.
    pub pepper: Option<String>,
    /// Minimum password length accepted at registration.
    pub min_password_length: usize,
    /// Where guards read roles and permissions from.
    pub trust_model: TrustModel,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: "change-me-in-production".into(),
            algorithm: Algorithm::HS256,
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 604_800,
            pepper: None,
            min_password_length: 8,
            trust_model: TrustModel::LiveLookup,
        }
    }
}
