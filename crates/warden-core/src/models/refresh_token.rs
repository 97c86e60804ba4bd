//! Refresh token ledger model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    /// SHA-256 of the issued token, hex-encoded.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Valid iff not revoked and `expires_at` is strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefreshToken {
    pub user_id: Uuid,
    /// The raw signed token; only its hash is persisted.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(revoked: bool, expires_at: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "h".into(),
            expires_at,
            revoked,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn validity_requires_future_expiry_and_no_revocation() {
        let now = Utc::now();
        assert!(token(false, now + Duration::minutes(1)).is_valid_at(now));
        assert!(!token(true, now + Duration::minutes(1)).is_valid_at(now));
        assert!(!token(false, now - Duration::minutes(1)).is_valid_at(now));
        // Expiry must be strictly in the future.
        assert!(!token(false, now).is_valid_at(now));
    }
}
