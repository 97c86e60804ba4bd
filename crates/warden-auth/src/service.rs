//! Authentication service: registration, login, refresh rotation and
//! logout.

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::refresh_token::CreateRefreshToken;
use warden_core::models::user::{CreateUser, User, UserWithRoles};
use warden_core::repository::{RefreshTokenRepository, UserRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, TokenSubject, TokenType};

/// Input for self-service registration.
#[derive(Debug)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Tokens handed back after login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Authentication service.
///
/// Generic over repository implementations so the auth layer does not
/// depend on the database crate. Both repositories must be unrestricted:
/// credentials are checked before any tenant context exists.
pub struct AuthService<U: UserRepository, R: RefreshTokenRepository> {
    users: U,
    refresh_tokens: R,
    config: AuthConfig,
    /// Verified against on unknown emails so they cost as much as a wrong
    /// password.
    dummy_hash: OnceCell<String>,
}

impl<U: UserRepository, R: RefreshTokenRepository> AuthService<U, R> {
    pub fn new(users: U, refresh_tokens: R, config: AuthConfig) -> Self {
        Self {
            users,
            refresh_tokens,
            config,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Register a regular, active user without a tenant.
    pub async fn register(&self, input: RegisterInput) -> WardenResult<User> {
        if input.password != input.password_confirm {
            return Err(AuthError::PasswordMismatch.into());
        }
        self.create_user(input.email, input.password, false).await
    }

    /// Provision an active superuser without a tenant.
    pub async fn create_superuser(&self, email: &str, password: &str) -> WardenResult<User> {
        let user = self
            .create_user(email.to_string(), password.to_string(), true)
            .await?;
        info!(user_id = %user.id, "superuser created");
        Ok(user)
    }

    async fn create_user(
        &self,
        email: String,
        password: String,
        is_superuser: bool,
    ) -> WardenResult<User> {
        let email = normalize_email(&email)?;
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::PasswordTooShort {
                min: self.config.min_password_length,
            }
            .into());
        }

        let hashed_password = self.hash(password).await?;
        self.users
            .create(CreateUser {
                email,
                hashed_password,
                is_active: true,
                is_superuser,
                tenant_id: None,
            })
            .await
    }

    /// Check credentials and issue a fresh token pair.
    pub async fn login(&self, email: &str, password: &str) -> WardenResult<TokenPair> {
        let user = match self.users.get_by_email(&email.trim().to_lowercase()).await {
            Ok(user) => user,
            Err(WardenError::NotFound { .. }) => {
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| self.hash("warden-dummy-password".to_string()))
                    .await?;
                self.verify(password, dummy).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        if !self.verify(password, &user.hashed_password).await? {
            warn!(user_id = %user.id, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            warn!(user_id = %user.id, "login refused: account inactive");
            return Err(AuthError::AccountInactive.into());
        }

        let user = self.users.get_with_roles(user.id).await?;
        let (pair, replacement) = self.mint(&user)?;
        self.refresh_tokens.issue(replacement).await?;

        info!(user_id = %user.user.id, "user logged in");
        Ok(pair)
    }

    /// Exchange a valid refresh token for a new pair. The old refresh
    /// token is revoked in the same transaction that stores the new one.
    pub async fn refresh(&self, refresh_token: &str) -> WardenResult<TokenPair> {
        let claims = token::decode_expecting(refresh_token, TokenType::Refresh, &self.config)
            .ok_or_else(AuthError::credentials)?;
        let user_id = claims.user_id().ok_or_else(AuthError::credentials)?;

        let entry = self
            .refresh_tokens
            .find_valid(refresh_token)
            .await?
            .ok_or_else(|| AuthError::TokenInvalid("refresh token revoked or expired".into()))?;
        if entry.user_id != user_id {
            warn!(%user_id, ledger_user = %entry.user_id, "refresh token subject mismatch");
            return Err(AuthError::credentials().into());
        }

        let user = match self.users.get_with_roles(user_id).await {
            Ok(user) => user,
            Err(WardenError::NotFound { .. }) => return Err(AuthError::credentials().into()),
            Err(e) => return Err(e),
        };
        if !user.user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        let (pair, replacement) = self.mint(&user)?;
        self.refresh_tokens
            .rotate(refresh_token, replacement)
            .await?
            .ok_or_else(|| AuthError::TokenInvalid("refresh token revoked or expired".into()))?;

        info!(%user_id, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke one refresh token. Returns whether it was known.
    pub async fn logout(&self, refresh_token: &str) -> WardenResult<bool> {
        self.refresh_tokens.revoke(refresh_token).await
    }

    /// Revoke every live refresh token of a user.
    pub async fn logout_everywhere(&self, user_id: Uuid) -> WardenResult<u64> {
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;
        info!(%user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// Maintenance sweep over the refresh-token ledger.
    pub async fn cleanup_expired(&self) -> WardenResult<u64> {
        let removed = self.refresh_tokens.cleanup_expired().await?;
        info!(removed, "expired refresh tokens removed");
        Ok(removed)
    }

    fn mint(&self, user: &UserWithRoles) -> WardenResult<(TokenPair, CreateRefreshToken)> {
        let subject = TokenSubject::for_user(user);
        let access_token = token::create_access_token(&subject, None, &self.config)?;
        let (refresh_token, expires_at) = token::create_refresh_token(&subject, &self.config)?;

        let replacement = CreateRefreshToken {
            user_id: user.user.id,
            token: refresh_token.clone(),
            expires_at,
        };
        let pair = TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".into(),
            expires_in: self.config.access_token_lifetime_secs,
        };
        Ok((pair, replacement))
    }

    // Argon2 is deliberately slow; keep it off the async worker threads.
    async fn hash(&self, password: String) -> WardenResult<String> {
        let pepper = self.config.pepper.clone();
        let hashed = tokio::task::spawn_blocking(move || {
            password::hash_password(&password, pepper.as_deref())
        })
        .await
        .map_err(|e| AuthError::Crypto(format!("hash task: {e}")))??;
        Ok(hashed)
    }

    async fn verify(&self, password: &str, hash: &str) -> WardenResult<bool> {
        let pepper = self.config.pepper.clone();
        let (password, hash) = (password.to_string(), hash.to_string());
        let valid = tokio::task::spawn_blocking(move || {
            password::verify_password(&password, &hash, pepper.as_deref())
        })
        .await
        .map_err(|e| AuthError::Crypto(format!("verify task: {e}")))??;
        Ok(valid)
    }
}

/// Trim and lowercase an email, rejecting values without a local part
/// and a domain.
fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(AuthError::InvalidEmail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        for bad in ["", "alice", "@example.com", "alice@", "a@b@c"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }
}
