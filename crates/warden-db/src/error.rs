//! Database-specific error types and conversions.

use tracing::error;
use warden_core::error::WardenError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Malformed record: {0}")]
    InvalidRecord(String),

    #[error("Write outside tenant scope: {entity}")]
    OutOfScope { entity: String },
}

impl DbError {
    /// Classify a failed write. A violation of the unique `index` means a
    /// concurrent writer claimed the same value after the pre-check.
    pub(crate) fn on_unique_write(err: surrealdb::Error, index: &str, entity: &str) -> Self {
        let message = err.to_string();
        if is_unique_violation(&message, index) {
            DbError::AlreadyExists {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

fn is_unique_violation(message: &str, index: &str) -> bool {
    message.contains(&format!("index `{index}` already contains"))
}

impl From<DbError> for WardenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardenError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => WardenError::AlreadyExists { entity },
            DbError::OutOfScope { entity } => WardenError::Forbidden {
                reason: format!("{entity} is outside the current tenant scope"),
            },
            other => {
                error!(error = %other, "storage failure");
                WardenError::Database(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_matches_only_the_named_index() {
        let message = "Database index `idx_user_email` already contains 'dup@example.com', \
                       with record `user:abc`";
        assert!(is_unique_violation(message, "idx_user_email"));
        assert!(!is_unique_violation(message, "idx_role_name"));
        assert!(!is_unique_violation("Found NONE for field `email`", "idx_user_email"));
    }
}
