//! SurrealDB implementation of [`RefreshTokenRepository`].

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use warden_core::repository::RefreshTokenRepository;

use super::parse_uuid;
use crate::error::DbError;

/// SHA-256 of a refresh token, hex-encoded. Only this digest is stored.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    record_id: String,
    user_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        Ok(RefreshToken {
            id: parse_uuid(&self.record_id, "refresh token")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            revoked: self.revoked,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub(crate) fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn get(&self, id: &str) -> Result<Option<RefreshToken>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('refresh_token', $id)",
            )
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<RefreshTokenRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(RefreshTokenRow::try_into_token)
            .transpose()
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn issue(&self, input: CreateRefreshToken) -> WardenResult<RefreshToken> {
        let id_str = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('refresh_token', $id) SET \
                 user_id = $user_id, token_hash = $token_hash, \
                 expires_at = $expires_at, revoked = false",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_hash", hash_refresh_token(&input.token)))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let token = self.get(&id_str).await?.ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: id_str,
        })?;
        Ok(token)
    }

    async fn find_valid(&self, token: &str) -> WardenResult<Option<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE token_hash = $token_hash AND revoked = false \
                 AND expires_at > time::now()",
            )
            .bind(("token_hash", hash_refresh_token(token)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let now = Utc::now();
        let token = rows
            .into_iter()
            .next()
            .map(RefreshTokenRow::try_into_token)
            .transpose()?
            .filter(|t| t.is_valid_at(now));
        Ok(token)
    }

    async fn revoke(&self, token: &str) -> WardenResult<bool> {
        let mut result = self
            .db
            .query(
                "UPDATE refresh_token SET revoked = true \
                 WHERE token_hash = $token_hash RETURN VALUE token_hash",
            )
            .bind(("token_hash", hash_refresh_token(token)))
            .await
            .map_err(DbError::from)?;

        let touched: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!touched.is_empty())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> WardenResult<u64> {
        let mut result = self
            .db
            .query(
                "UPDATE refresh_token SET revoked = true \
                 WHERE user_id = $user_id AND revoked = false \
                 RETURN VALUE token_hash",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let touched: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(touched.len() as u64)
    }

    async fn cleanup_expired(&self) -> WardenResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE refresh_token WHERE expires_at < time::now() \
                 RETURN BEFORE",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        debug!(removed = rows.len(), "expired refresh tokens deleted");
        Ok(rows.len() as u64)
    }

    async fn rotate(
        &self,
        old_token: &str,
        replacement: CreateRefreshToken,
    ) -> WardenResult<Option<RefreshToken>> {
        let id_str = Uuid::new_v4().to_string();

        // The replacement is only created when the old token was still
        // valid inside the same transaction.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $revoked = (UPDATE refresh_token SET revoked = true \
                     WHERE token_hash = $old_hash AND revoked = false \
                     AND expires_at > time::now() RETURN token_hash); \
                 IF array::len($revoked) > 0 { \
                     CREATE type::record('refresh_token', $id) SET \
                     user_id = $user_id, token_hash = $token_hash, \
                     expires_at = $expires_at, revoked = false; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("old_hash", hash_refresh_token(old_token)))
            .bind(("id", id_str.clone()))
            .bind(("user_id", replacement.user_id.to_string()))
            .bind(("token_hash", hash_refresh_token(&replacement.token)))
            .bind(("expires_at", replacement.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(self.get(&id_str).await?)
    }
}
