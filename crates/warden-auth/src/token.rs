//! Signed access and refresh tokens carrying authorization claims.
//!
//! Both token kinds share one claim shape and differ in `type` and
//! lifetime. Access tokens are stateless; refresh tokens are also
//! recorded in the ledger so they can be revoked early.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use warden_core::models::user::UserWithRoles;
use warden_core::tenant::{TenantId, TenantScope};

use crate::config::AuthConfig;
use crate::error::AuthError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// The caller-supplied part of a token: who it is for and what they hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSubject {
    pub sub: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub tenant_id: Option<TenantId>,
    pub is_superuser: bool,
}

impl TokenSubject {
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            ..Default::default()
        }
    }

    /// Snapshot of a user's current roles and permissions.
    pub fn for_user(user: &UserWithRoles) -> Self {
        Self {
            sub: user.user.id.to_string(),
            roles: user.role_names(),
            permissions: user
                .all_permissions()
                .into_iter()
                .map(String::from)
                .collect(),
            tenant_id: user.user.tenant_id,
            is_superuser: user.user.is_superuser,
        }
    }
}

/// Decoded token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id, stringified.
    pub sub: String,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Unique token id, so two tokens minted in the same second differ.
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Integer or null. Kept raw so a malformed value degrades to "no
    /// tenant" instead of rejecting the whole token.
    #[serde(default)]
    pub tenant_id: serde_json::Value,
    #[serde(default)]
    pub is_superuser: bool,
}

impl Claims {
    pub fn tenant(&self) -> Option<TenantId> {
        TenantId::from_claim(&self.tenant_id)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

fn encode(
    subject: &TokenSubject,
    token_type: TokenType,
    ttl: Duration,
    config: &AuthConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let now = Utc::now();
    let expires_at = now + ttl;
    let claims = Claims {
        sub: subject.sub.clone(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
        token_type,
        roles: subject.roles.clone(),
        permissions: subject.permissions.clone(),
        tenant_id: subject
            .tenant_id
            .map(|t| serde_json::Value::from(t.get()))
            .unwrap_or(serde_json::Value::Null),
        is_superuser: subject.is_superuser,
    };

    let key = EncodingKey::from_secret(config.secret_key.as_bytes());
    let token = jsonwebtoken::encode(&Header::new(config.algorithm), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;
    Ok((token, expires_at))
}

/// Mint an access token. `ttl` overrides the configured lifetime.
pub fn create_access_token(
    subject: &TokenSubject,
    ttl: Option<Duration>,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let ttl = ttl.unwrap_or_else(|| Duration::seconds(config.access_token_lifetime_secs as i64));
    encode(subject, TokenType::Access, ttl, config).map(|(token, _)| token)
}

/// Mint a refresh token, returning it with its expiry for persistence.
pub fn create_refresh_token(
    subject: &TokenSubject,
    config: &AuthConfig,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let ttl = Duration::seconds(config.refresh_token_lifetime_secs as i64);
    encode(subject, TokenType::Refresh, ttl, config)
}

/// Verify signature and expiry. Any failure yields `None`.
pub fn decode_token(token: &str, config: &AuthConfig) -> Option<Claims> {
    let key = DecodingKey::from_secret(config.secret_key.as_bytes());
    let mut validation = Validation::new(config.algorithm);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    match jsonwebtoken::decode::<Claims>(token, &key, &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!(error = %e, "token rejected");
            None
        }
    }
}

/// Decode and require a specific `type` claim.
pub fn decode_expecting(
    token: &str,
    expected: TokenType,
    config: &AuthConfig,
) -> Option<Claims> {
    decode_token(token, config).filter(|claims| {
        let matches = claims.token_type == expected;
        if !matches {
            debug!(expected = %expected, actual = %claims.token_type, "token type mismatch");
        }
        matches
    })
}

/// Tenant scope taken from the claims snapshot of `token`.
///
/// Only consistent with [`TrustModel::ClaimsTrust`](warden_core::authz::TrustModel);
/// live-lookup deployments go through
/// [`PrincipalResolver::tenant_scope`](crate::principal::PrincipalResolver::tenant_scope).
/// Anything short of a valid access token with an integer tenant claim
/// yields [`TenantScope::Anonymous`]; a superuser claim is unrestricted.
pub fn tenant_scope_from_token(token: Option<&str>, config: &AuthConfig) -> TenantScope {
    let Some(claims) = token.and_then(|t| decode_expecting(t, TokenType::Access, config)) else {
        return TenantScope::Anonymous;
    };
    TenantScope::for_principal(claims.is_superuser, claims.tenant())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> AuthConfig {
        AuthConfig {
            secret_key: "test-secret".into(),
            ..Default::default()
        }
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            sub: "1".into(),
            roles: vec!["staff".into()],
            permissions: vec!["users:read".into()],
            tenant_id: Some(TenantId::new(3)),
            is_superuser: false,
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let config = test_config();
        let token = create_access_token(&TokenSubject::new("1"), None, &config).unwrap();
        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "1");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.tenant().is_none());
    }

    #[test]
    fn claims_carry_authorization_snapshot() {
        let config = test_config();
        let token = create_access_token(&subject(), None, &config).unwrap();
        let claims = decode_token(&token, &config).unwrap();
        assert_eq!(claims.roles, vec!["staff"]);
        assert_eq!(claims.permissions, vec!["users:read"]);
        assert_eq!(claims.tenant(), Some(TenantId::new(3)));
        assert!(claims.exp - claims.iat <= 900);
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let config = test_config();
        let access = create_access_token(&subject(), None, &config).unwrap();
        assert!(decode_expecting(&access, TokenType::Refresh, &config).is_none());

        let (refresh, expires_at) = create_refresh_token(&subject(), &config).unwrap();
        assert!(decode_expecting(&refresh, TokenType::Access, &config).is_none());
        let claims = decode_expecting(&refresh, TokenType::Refresh, &config).unwrap();
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(expires_at > Utc::now() + Duration::days(6));
    }

    #[test]
    fn foreign_signature_and_garbage_are_rejected() {
        let config = test_config();
        let other = AuthConfig {
            secret_key: "other-secret".into(),
            ..Default::default()
        };
        let token = create_access_token(&subject(), None, &other).unwrap();
        assert!(decode_token(&token, &config).is_none());
        assert!(decode_token("not.a.token", &config).is_none());
        assert!(decode_token("", &config).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let token =
            create_access_token(&subject(), Some(Duration::seconds(-5)), &config).unwrap();
        assert!(decode_token(&token, &config).is_none());
    }

    #[test]
    fn tokens_are_unique() {
        let config = test_config();
        let a = create_access_token(&subject(), None, &config).unwrap();
        let b = create_access_token(&subject(), None, &config).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tenant_scope_resolution() {
        let config = test_config();
        let tenant = create_access_token(&subject(), None, &config).unwrap();
        assert_eq!(
            tenant_scope_from_token(Some(&tenant), &config),
            TenantScope::Tenant(TenantId::new(3))
        );

        let superuser = TokenSubject {
            is_superuser: true,
            ..subject()
        };
        let root = create_access_token(&superuser, None, &config).unwrap();
        assert_eq!(
            tenant_scope_from_token(Some(&root), &config),
            TenantScope::Unrestricted
        );

        let (refresh, _) = create_refresh_token(&subject(), &config).unwrap();
        assert_eq!(
            tenant_scope_from_token(Some(&refresh), &config),
            TenantScope::Anonymous
        );
        assert_eq!(
            tenant_scope_from_token(Some("garbage"), &config),
            TenantScope::Anonymous
        );
        assert_eq!(tenant_scope_from_token(None, &config), TenantScope::Anonymous);
    }

    #[test]
    fn non_integer_tenant_claim_means_no_tenant() {
        let config = test_config();
        let claims = json!({
            "sub": "1",
            "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
            "iat": Utc::now().timestamp(),
            "jti": "x",
            "type": "access",
            "tenant_id": "acme",
        });
        let key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let token = jsonwebtoken::encode(&Header::default(), &claims, &key).unwrap();
        assert_eq!(
            tenant_scope_from_token(Some(&token), &config),
            TenantScope::Anonymous
        );
    }
}
