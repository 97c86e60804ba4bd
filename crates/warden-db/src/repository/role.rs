//! SurrealDB implementation of [`RoleRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::permission::Permission;
use warden_core::models::role::{CreateRole, Role};
use warden_core::repository::{
    PaginatedResult, Pagination, PermissionRepository, RoleRepository,
};
use warden_core::tenant::{IsolationMode, TenantScope};

use super::permission::{PermissionRow, SurrealPermissionRepository};
use super::{CountRow, count_matching, delete_edges, parse_uuid, tenant_of};
use crate::error::DbError;
use crate::tenant_filter::TenantFilter;

#[derive(Debug, SurrealValue)]
pub(crate) struct RoleRow {
    record_id: String,
    name: String,
    description: String,
    tenant_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    pub(crate) fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid(&self.record_id, "role")?,
            name: self.name,
            description: self.description,
            tenant_id: tenant_of(self.tenant_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Roles follow inclusive isolation, like permissions.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
    scope: TenantScope,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub(crate) fn new(db: Surreal<C>, scope: TenantScope) -> Self {
        Self { db, scope }
    }

    fn filter(&self) -> TenantFilter {
        TenantFilter::new(self.scope, IsolationMode::Inclusive)
    }

    /// Granted permissions of a role, without checking the role itself.
    pub(crate) async fn permissions_of(&self, role_id: Uuid) -> Result<Vec<Permission>, DbError> {
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM permission \
             WHERE {} AND id IN (\
                 SELECT VALUE out FROM grants \
                 WHERE in = type::record('role', $role_id)\
             ) ORDER BY codename ASC",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("role_id", role_id.to_string()))
            .bind(filter.binding())
            .await?;

        let rows: Vec<PermissionRow> = result.take(0)?;
        rows.into_iter()
            .map(PermissionRow::try_into_permission)
            .collect()
    }

    /// Visible roles assigned to a user through `has_role`.
    pub(crate) async fn assigned_to(&self, user_id: Uuid) -> Result<Vec<Role>, DbError> {
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM role \
             WHERE {} AND id IN (\
                 SELECT VALUE out FROM has_role \
                 WHERE in = type::record('user', $user_id)\
             ) ORDER BY name ASC",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .bind(filter.binding())
            .await?;

        let rows: Vec<RoleRow> = result.take(0)?;
        rows.into_iter().map(RoleRow::try_into_role).collect()
    }

    fn ensure_writable(&self, role: &Role) -> Result<(), DbError> {
        if self.scope.may_write(role.tenant_id) {
            Ok(())
        } else {
            Err(DbError::OutOfScope {
                entity: "role".into(),
            })
        }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> WardenResult<Role> {
        if !self.scope.may_write(input.tenant_id) {
            return Err(DbError::OutOfScope {
                entity: "role".into(),
            }
            .into());
        }
        if count_matching(&self.db, "role", "name", input.name.clone()).await? > 0 {
            return Err(DbError::AlreadyExists {
                entity: "role".into(),
            }
            .into());
        }

        let id_str = Uuid::new_v4().to_string();
        let result = self
            .db
            .query(
                "CREATE type::record('role', $id) SET \
                 name = $name, description = $description, \
                 tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('role', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("tenant_id", input.tenant_id.map(|t| t.get())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_unique_write(e, "idx_role_name", "role"))?;

        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;
        Ok(row.try_into_role()?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Role> {
        let id_str = id.to_string();
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * \
             FROM type::record('role', $id) WHERE {}",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;
        Ok(row.try_into_role()?)
    }

    async fn get_by_name(&self, name: &str) -> WardenResult<Role> {
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM role \
             WHERE name = $name AND {}",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("name", name.to_string()))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: name.to_string(),
        })?;
        Ok(row.try_into_role()?)
    }

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<Role>> {
        let filter = self.filter();

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM role WHERE {} GROUP ALL",
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
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE {} ORDER BY name ASC \
                 LIMIT $limit START $offset",
                filter.clause()
            ))
            .bind(filter.binding())
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(RoleRow::try_into_role)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> WardenResult<()> {
        let role = self.get_by_id(role_id).await?;
        self.ensure_writable(&role)?;
        // Visibility of the permission under the role's own tenant.
        let role_scope = TenantScope::for_principal(false, role.tenant_id);
        let permission = SurrealPermissionRepository::new(self.db.clone(), self.scope)
            .get_by_id(permission_id)
            .await?;
        if !role_scope.admits(IsolationMode::Inclusive, permission.tenant_id) {
            return Err(DbError::OutOfScope {
                entity: "permission".into(),
            }
            .into());
        }

        let role_id_str = role_id.to_string();
        let permission_id_str = permission_id.to_string();
        let mut existing = self
            .db
            .query(
                "SELECT count() AS total FROM grants \
                 WHERE in = type::record('role', $role_id) \
                 AND out = type::record('permission', $permission_id) \
                 GROUP ALL",
            )
            .bind(("role_id", role_id_str.clone()))
            .bind(("permission_id", permission_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = existing.take(0).map_err(DbError::from)?;
        if count_rows.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Ok(());
        }

        let query = format!(
            "RELATE role:`{role_id_str}` -> grants -> permission:`{permission_id_str}`;"
        );
        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> WardenResult<bool> {
        let role = self.get_by_id(role_id).await?;
        self.ensure_writable(&role)?;

        let removed = delete_edges(
            &self.db,
            "LET $edges = (SELECT VALUE id FROM grants WHERE \
                 in = type::record('role', $from) AND \
                 out = type::record('permission', $to)); \
             DELETE $edges; \
             RETURN array::len($edges);",
            role_id,
            permission_id,
        )
        .await?;
        Ok(removed)
    }

    async fn get_permissions(&self, role_id: Uuid) -> WardenResult<Vec<Permission>> {
        self.get_by_id(role_id).await?;
        Ok(self.permissions_of(role_id).await?)
    }
}
