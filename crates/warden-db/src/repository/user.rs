//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::role::RoleWithPermissions;
use warden_core::models::user::{CreateUser, UpdateUser, User, UserWithRoles};
use warden_core::repository::{PaginatedResult, Pagination, RoleRepository, UserRepository};
use warden_core::tenant::{IsolationMode, TenantScope};

use super::role::SurrealRoleRepository;
use super::{CountRow, count_matching, delete_edges, parse_uuid, tenant_of};
use crate::error::DbError;
use crate::tenant_filter::TenantFilter;

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    email: String,
    hashed_password: String,
    is_active: bool,
    is_superuser: bool,
    tenant_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            email: self.email,
            hashed_password: self.hashed_password,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            tenant_id: tenant_of(self.tenant_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Users are strictly isolated: a user without a tenant is only visible
/// to an unrestricted session.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    scope: TenantScope,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub(crate) fn new(db: Surreal<C>, scope: TenantScope) -> Self {
        Self { db, scope }
    }

    fn filter(&self) -> TenantFilter {
        TenantFilter::new(self.scope, IsolationMode::Strict)
    }

    fn out_of_scope() -> DbError {
        DbError::OutOfScope {
            entity: "user".into(),
        }
    }

    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool, DbError> {
        let Some(except) = except else {
            return Ok(count_matching(&self.db, "user", "email", email.to_string()).await? > 0);
        };
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE email = $email AND meta::id(id) != $except GROUP ALL",
            )
            .bind(("email", email.to_string()))
            .bind(("except", except.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> WardenResult<User> {
        if !self.scope.may_write(input.tenant_id) {
            return Err(Self::out_of_scope().into());
        }
        if self.email_taken(&input.email, None).await? {
            return Err(DbError::AlreadyExists {
                entity: "user".into(),
            }
            .into());
        }

        let id_str = Uuid::new_v4().to_string();
        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 email = $email, hashed_password = $hashed_password, \
                 is_active = $is_active, is_superuser = $is_superuser, \
                 tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("email", input.email))
            .bind(("hashed_password", input.hashed_password))
            .bind(("is_active", input.is_active))
            .bind(("is_superuser", input.is_superuser))
            .bind(("tenant_id", input.tenant_id.map(|t| t.get())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::on_unique_write(e, "idx_user_email", "user"))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<User> {
        let id_str = id.to_string();
        let filter = self.filter();
        let query = format!(
            "SELECT meta::id(id) AS record_id, * \
             FROM type::record('user', $id) WHERE {}",
            filter.clause()
        );

        let mut result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;
        Ok(row.try_into_user()?)
    }

    async fn get_by_email(&self, email: &str) -> WardenResult<User> {
        let not_found = || DbError::NotFound {
            entity: "user".into(),
            id: email.to_string(),
        };
        let filter = self.filter();
        if filter.is_empty() {
            return Err(not_found().into());
        }

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user \
             WHERE email = $email AND {}",
            filter.clause()
        );
        let mut result = self
            .db
            .query(query)
            .bind(("email", email.to_string()))
            .bind(filter.binding())
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(not_found)?;
        Ok(row.try_into_user()?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> WardenResult<User> {
        let existing = self.get_by_id(id).await?;
        if !self.scope.may_write(existing.tenant_id) {
            return Err(Self::out_of_scope().into());
        }
        if let Some(target) = input.tenant_id
            && !self.scope.may_write(target)
        {
            return Err(Self::out_of_scope().into());
        }
        if let Some(email) = &input.email
            && self.email_taken(email, Some(id)).await?
        {
            return Err(DbError::AlreadyExists {
                entity: "user".into(),
            }
            .into());
        }

        let id_str = id.to_string();
        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.hashed_password.is_some() {
            sets.push("hashed_password = $hashed_password");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.is_superuser.is_some() {
            sets.push("is_superuser = $is_superuser");
        }
        if input.tenant_id.is_some() {
            sets.push("tenant_id = $tenant_id");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {}; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('user', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(hashed_password) = input.hashed_password {
            builder = builder.bind(("hashed_password", hashed_password));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(is_superuser) = input.is_superuser {
            builder = builder.bind(("is_superuser", is_superuser));
        }
        if let Some(tenant_id) = input.tenant_id {
            builder = builder.bind(("tenant_id", tenant_id.map(|t| t.get())));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::on_unique_write(e, "idx_user_email", "user"))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;
        Ok(row.try_into_user()?)
    }

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<User>> {
        let filter = self.filter();
        if filter.is_empty() {
            return Ok(PaginatedResult {
                items: Vec::new(),
                total: 0,
                offset: pagination.offset,
                limit: pagination.limit,
            });
        }

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM user WHERE {} GROUP ALL",
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
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE {} ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
                filter.clause()
            ))
            .bind(filter.binding())
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<()> {
        let user = self.get_by_id(user_id).await?;
        if !self.scope.may_write(user.tenant_id) {
            return Err(Self::out_of_scope().into());
        }
        // The role must be visible from the user's own tenant, not merely
        // from the caller's session.
        let user_scope = TenantScope::for_principal(false, user.tenant_id);
        let role = SurrealRoleRepository::new(self.db.clone(), self.scope)
            .get_by_id(role_id)
            .await?;
        if !user_scope.admits(IsolationMode::Inclusive, role.tenant_id) {
            return Err(DbError::OutOfScope {
                entity: "role".into(),
            }
            .into());
        }

        let user_id_str = user_id.to_string();
        let role_id_str = role_id.to_string();
        let mut existing = self
            .db
            .query(
                "SELECT count() AS total FROM has_role \
                 WHERE in = type::record('user', $user_id) \
                 AND out = type::record('role', $role_id) GROUP ALL",
            )
            .bind(("user_id", user_id_str.clone()))
            .bind(("role_id", role_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = existing.take(0).map_err(DbError::from)?;
        if count_rows.first().map(|r| r.total).unwrap_or(0) > 0 {
            return Ok(());
        }

        let query = format!("RELATE user:`{user_id_str}` -> has_role -> role:`{role_id_str}`;");
        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> WardenResult<bool> {
        let user = self.get_by_id(user_id).await?;
        if !self.scope.may_write(user.tenant_id) {
            return Err(Self::out_of_scope().into());
        }

        let removed = delete_edges(
            &self.db,
            "LET $edges = (SELECT VALUE id FROM has_role WHERE \
                 in = type::record('user', $from) AND \
                 out = type::record('role', $to)); \
             DELETE $edges; \
             RETURN array::len($edges);",
            user_id,
            role_id,
        )
        .await?;
        Ok(removed)
    }

    async fn get_roles(&self, user_id: Uuid) -> WardenResult<Vec<RoleWithPermissions>> {
        self.get_by_id(user_id).await?;

        let roles_repo = SurrealRoleRepository::new(self.db.clone(), self.scope);
        let roles = roles_repo.assigned_to(user_id).await?;

        let mut loaded = Vec::with_capacity(roles.len());
        for role in roles {
            let permissions = roles_repo
                .permissions_of(role.id)
                .await?
                .into_iter()
                .map(|p| p.codename)
                .collect();
            loaded.push(RoleWithPermissions { role, permissions });
        }
        Ok(loaded)
    }

    async fn get_with_roles(&self, id: Uuid) -> WardenResult<UserWithRoles> {
        let user = self.get_by_id(id).await?;
        let roles = self.get_roles(id).await?;
        Ok(UserWithRoles { user, roles })
    }
}
