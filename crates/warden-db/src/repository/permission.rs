//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::permission::{Codename, CreatePermission, Permission};
use warden_core::repository::{PaginatedResult, Pagination, PermissionRepository};
use warden_core::tenant::{IsolationMode, TenantScope};

use super::{CountRow, count_matching, parse_uuid, tenant_of};
use crate::error::DbError;
use crate::tenant_filter::TenantFilter;

#[derive(Debug, SurrealValue)]
pub(crate) struct PermissionRow {
    record_id: String,
    codename: String,
    description: String,
    tenant_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRow {
    pub(crate) fn try_into_permission(self) -> Result<Permission, DbError> {
        let codename = Codename::parse(self.codename)
            .map_err(|e| DbError::InvalidRecord(e.to_string()))?;
        Ok(Permission {
            id: parse_uuid(&self.record_id, "permission")?,
            codename,
            description: self.description,
            tenant_id: tenant_of(self.tenant_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Permissions are shared catalog rows: global entries are visible to
/// every tenant (inclusive isolation).
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
    scope: TenantScope,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub(crate) fn new(db: Surreal<C>, scope: TenantScope) -> Self {
        Self { db, scope }
    }

    fn filter(&self) -> TenantFilter {
        TenantFilter::new(self.scope, IsolationMode::Inclusive)
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> WardenResult<Permission> {
        if !self.scope.may_write(input.tenant_id) {
            return Err(DbError::OutOfScope {
                entity: "permission".into(),
            }
            .into());
        }
        let codename = input.codename.to_string();
        if count_matching(&self.db, "permission", "codename", codename.clone()).await? > 0 {
            return Err(DbError::AlreadyExists {
                entity: "permission".into(),
            }
            .into());
        }

        let id_str = Uuid::new_v4().to_string();
        let result = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 codename = $codename, description = $description, \
                 tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('permission', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("codename", codename))
            .bind(("description", input.description))
            .bind(("tenant_id", input.tenant_id.map(|t| t.get())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_unique_write(e, "idx_permission_codename", "permission"))?;

        let rows: Vec<PermissionRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;
        Ok(row.try_into_permission()?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Permission> {
        let id_str = id.to_string();
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * \
             FROM type::record('permission', $id) WHERE {}",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;
        Ok(row.try_into_permission()?)
    }

    async fn get_by_codename(&self, codename: &str) -> WardenResult<Permission> {
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM permission \
             WHERE codename = $codename AND {}",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("codename", codename.to_string()))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: codename.to_string(),
        })?;
        Ok(row.try_into_permission()?)
    }

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<Permission>> {
        let filter = self.filter();

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM permission WHERE {} GROUP ALL",
                filter.clause()
            ))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE {} ORDER BY codename ASC \
                 LIMIT $limit START $offset",
                filter.clause()
            ))
            .bind(filter.binding())
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(PermissionRow::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
