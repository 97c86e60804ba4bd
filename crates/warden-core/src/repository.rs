//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations are handed out by
//! a tenant-scoped storage session, so none of these methods take a tenant
//! parameter: the scope is fixed when the session is opened and every read
//! is filtered by it.

use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    permission::{CreatePermission, Permission},
    refresh_token::{CreateRefreshToken, RefreshToken},
    role::{CreateRole, Role, RoleWithPermissions},
    user::{CreateUser, UpdateUser, User, UserWithRoles},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// RBAC catalog (inclusive isolation)
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_codename(
        &self,
        codename: &str,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Permission>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    fn create(&self, input: CreateRole) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = WardenResult<Role>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<Role>>> + Send;

    /// Grant a permission to a role. Granting twice is a no-op.
    fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    /// Revoke a permission from a role. Returns whether a grant existed.
    fn revoke_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = WardenResult<bool>> + Send;

    /// All permissions granted to a role that are visible in this scope.
    fn get_permissions(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
}

// ---------------------------------------------------------------------------
// Users (strict isolation)
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = WardenResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<User>>> + Send;

    /// Assign a role to a user. Assigning twice is a no-op.
    fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<()>> + Send;

    /// Remove a role assignment from a user. Returns whether the user held
    /// the role.
    fn unassign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = WardenResult<bool>> + Send;

    /// Roles held by a user, each with the codenames it grants.
    fn get_roles(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = WardenResult<Vec<RoleWithPermissions>>> + Send;

    /// Load a user together with its roles and permissions.
    fn get_with_roles(&self, id: Uuid)
    -> impl Future<Output = WardenResult<UserWithRoles>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh-token ledger (not tenant-scoped)
// ---------------------------------------------------------------------------

pub trait RefreshTokenRepository: Send + Sync {
    /// Persist a newly minted refresh token.
    fn issue(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = WardenResult<RefreshToken>> + Send;

    /// The ledger entry for `token` if it is not revoked and not expired.
    fn find_valid(
        &self,
        token: &str,
    ) -> impl Future<Output = WardenResult<Option<RefreshToken>>> + Send;

    /// Revoke one token. Returns whether a ledger entry matched.
    fn revoke(&self, token: &str) -> impl Future<Output = WardenResult<bool>> + Send;

    /// Revoke every unrevoked token of a user. Returns how many changed.
    fn revoke_all_for_user(&self, user_id: Uuid)
    -> impl Future<Output = WardenResult<u64>> + Send;

    /// Delete expired entries. Returns how many were removed.
    fn cleanup_expired(&self) -> impl Future<Output = WardenResult<u64>> + Send;

    /// Revoke `old_token` and persist `replacement` in one transaction.
    ///
    /// Returns `None`, writing nothing, when `old_token` was no longer
    /// valid at commit time (for example a concurrent rotation won).
    fn rotate(
        &self,
        old_token: &str,
        replacement: CreateRefreshToken,
    ) -> impl Future<Output = WardenResult<Option<RefreshToken>>> + Send;
}
