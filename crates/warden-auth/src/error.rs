//! Authentication error types.

use thiserror::Error;
use warden_core::error::WardenError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("invalid email address")]
    InvalidEmail,

    #[error("{0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl AuthError {
    /// The generic rejection for anything wrong with a presented token.
    pub fn credentials() -> Self {
        AuthError::TokenInvalid("could not validate credentials".into())
    }
}

impl From<AuthError> for WardenError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::TokenInvalid(_) => {
                WardenError::Unauthorized {
                    reason: err.to_string(),
                }
            }
            AuthError::AccountInactive => WardenError::Forbidden {
                reason: err.to_string(),
            },
            AuthError::PasswordMismatch
            | AuthError::PasswordTooShort { .. }
            | AuthError::InvalidEmail => WardenError::Validation {
                message: err.to_string(),
            },
            AuthError::Crypto(msg) => WardenError::Crypto(msg),
        }
    }
}
