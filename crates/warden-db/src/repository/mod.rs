//! SurrealDB repository implementations.

mod permission;
mod refresh_token;
mod role;
mod user;

pub use permission::SurrealPermissionRepository;
pub use refresh_token::{SurrealRefreshTokenRepository, hash_refresh_token};
pub use role::SurrealRoleRepository;
pub use user::SurrealUserRepository;

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::tenant::TenantId;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Run an edge-deleting script whose last statement returns the number of
/// removed edges. `$from` and `$to` are bound to the endpoint ids.
pub(crate) async fn delete_edges<C: Connection>(
    db: &Surreal<C>,
    script: &str,
    from: Uuid,
    to: Uuid,
) -> Result<bool, DbError> {
    let mut result = db
        .query(script)
        .bind(("from", from.to_string()))
        .bind(("to", to.to_string()))
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;

    let last = result.num_statements().saturating_sub(1);
    let removed: Option<u64> = result.take(last)?;
    Ok(removed.unwrap_or(0) > 0)
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::InvalidRecord(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn tenant_of(raw: Option<i64>) -> Option<TenantId> {
    raw.map(TenantId::new)
}

/// Number of rows in `table` whose `field` equals `value`, ignoring tenant.
///
/// Used for global uniqueness checks before inserts.
pub(crate) async fn count_matching<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    field: &str,
    value: String,
) -> Result<u64, DbError> {
    let query = format!("SELECT count() AS total FROM {table} WHERE {field} = $value GROUP ALL");
    let mut result = db.query(query).bind(("value", value)).await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0))
}
