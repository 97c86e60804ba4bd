//! Error types for the Warden system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// HTTP-style status class for the routing layer.
    pub fn status_code(&self) -> u16 {
        match self {
            WardenError::Validation { .. } => 400,
            WardenError::Unauthorized { .. } => 401,
            WardenError::Forbidden { .. } => 403,
            WardenError::NotFound { .. } => 404,
            WardenError::AlreadyExists { .. } => 409,
            WardenError::Database(_) | WardenError::Crypto(_) | WardenError::Internal(_) => 500,
        }
    }

    /// Message that is safe to show to the caller.
    ///
    /// Storage, crypto and internal failures never leak their detail;
    /// log the error itself for diagnosis.
    pub fn public_message(&self) -> String {
        match self {
            WardenError::Validation { message } => message.clone(),
            WardenError::Unauthorized { reason } | WardenError::Forbidden { reason } => {
                reason.clone()
            }
            WardenError::AlreadyExists { entity } => format!("{entity} already exists"),
            WardenError::NotFound { entity, .. } => format!("{entity} not found"),
            WardenError::Database(_) | WardenError::Crypto(_) | WardenError::Internal(_) => {
                "An unexpected error occurred".into()
            }
        }
    }
}

pub type WardenResult<T> = Result<T, WardenError>;
