//! Authorization decision procedure.
//!
//! A [`Guard`] is built from a role set or a permission codename and
//! evaluated against a resolved [`Principal`]. Evaluation order is fixed:
//!
//! 1. no principal → `Unauthorized`
//! 2. inactive principal → `Forbidden` (superusers included)
//! 3. superuser → allow
//! 4. requirement check → allow or `Forbidden`

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{WardenError, WardenResult};
use crate::models::permission::Codename;
use crate::models::user::UserWithRoles;
use crate::tenant::{TenantId, TenantScope};

/// Where a principal's roles and permissions come from.
///
/// Chosen once per deployment; the two are never mixed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustModel {
    /// Re-read roles and permissions from storage on every request.
    #[default]
    LiveLookup,
    /// Trust the snapshot embedded in the access token until it expires.
    ClaimsTrust,
}

impl fmt::Display for TrustModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustModel::LiveLookup => f.write_str("live_lookup"),
            TrustModel::ClaimsTrust => f.write_str("claims_trust"),
        }
    }
}

/// An authenticated identity as seen by the authorization layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub is_active: bool,
    pub is_superuser: bool,
    roles: BTreeSet<String>,
    permissions: BTreeSet<Codename>,
}

impl Principal {
    pub fn new(
        id: Uuid,
        tenant_id: Option<TenantId>,
        is_active: bool,
        is_superuser: bool,
        roles: impl IntoIterator<Item = String>,
        permissions: impl IntoIterator<Item = Codename>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            is_active,
            is_superuser,
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains(name)
    }

    pub fn has_permission(&self, codename: &str) -> bool {
        self.is_superuser || self.permissions.iter().any(|p| p.as_str() == codename)
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn all_permissions(&self) -> &BTreeSet<Codename> {
        &self.permissions
    }

    /// Tenant scope for storage sessions opened on behalf of this principal.
    pub fn tenant_scope(&self) -> TenantScope {
        TenantScope::for_principal(self.is_superuser, self.tenant_id)
    }
}

impl From<&UserWithRoles> for Principal {
    fn from(value: &UserWithRoles) -> Self {
        Principal::new(
            value.user.id,
            value.user.tenant_id,
            value.user.is_active,
            value.user.is_superuser,
            value.role_names(),
            value.all_permissions(),
        )
    }
}

/// What a guard demands of a principal beyond being active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// At least one of the named roles. An empty set admits superusers only.
    AnyRole(Vec<String>),
    /// A single permission codename.
    Permission(Codename),
    /// Superusers only.
    Superuser,
    /// Every nested requirement.
    All(Vec<Requirement>),
}

impl Requirement {
    fn is_met_by(&self, principal: &Principal) -> bool {
        match self {
            Requirement::AnyRole(names) => names.iter().any(|n| principal.has_role(n)),
            Requirement::Permission(codename) => principal.has_permission(codename.as_str()),
            Requirement::Superuser => principal.is_superuser,
            Requirement::All(nested) => nested.iter().all(|r| r.is_met_by(principal)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::AnyRole(names) => write!(f, "Required roles: {names:?}"),
            Requirement::Permission(c) => write!(f, "Permission required: {c}"),
            Requirement::Superuser => f.write_str("Superuser access required"),
            Requirement::All(nested) => {
                let parts: Vec<String> = nested.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

/// A reusable access check, typically built once per route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    requirement: Requirement,
}

impl Guard {
    pub fn require_role<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requirement: Requirement::AnyRole(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn require_permission(codename: Codename) -> Self {
        Self {
            requirement: Requirement::Permission(codename),
        }
    }

    pub fn require_superuser() -> Self {
        Self {
            requirement: Requirement::Superuser,
        }
    }

    /// Combine with another guard; both must pass.
    pub fn and(self, other: Guard) -> Self {
        let mut parts = match self.requirement {
            Requirement::All(parts) => parts,
            single => vec![single],
        };
        parts.push(other.requirement);
        Self {
            requirement: Requirement::All(parts),
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Decide whether `principal` may pass.
    ///
    /// Returns the principal on success so handlers can chain on it.
    pub fn check<'p>(&self, principal: Option<&'p Principal>) -> WardenResult<&'p Principal> {
        let Some(principal) = principal else {
            return Err(WardenError::unauthorized("could not validate credentials"));
        };

        if !principal.is_active {
            warn!(principal_id = %principal.id, "inactive principal attempted access");
            return Err(WardenError::forbidden("Inactive user"));
        }

        if principal.is_superuser {
            return Ok(principal);
        }

        if self.requirement.is_met_by(principal) {
            Ok(principal)
        } else {
            warn!(
                principal_id = %principal.id,
                required = %self.requirement,
                "authorization denied"
            );
            Err(WardenError::forbidden(self.requirement.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codename(s: &str) -> Codename {
        Codename::parse(s).unwrap()
    }

    fn principal(active: bool, superuser: bool, roles: &[&str], perms: &[&str]) -> Principal {
        Principal::new(
            Uuid::new_v4(),
            Some(TenantId::new(1)),
            active,
            superuser,
            roles.iter().map(|r| r.to_string()),
            perms.iter().map(|p| codename(p)),
        )
    }

    #[test]
    fn role_guard_allows_any_listed_role() {
        let p = principal(true, false, &["support"], &[]);
        let guard = Guard::require_role(["staff", "support"]);
        assert!(guard.check(Some(&p)).is_ok());
    }

    #[test]
    fn role_guard_denies_without_role() {
        let p = principal(true, false, &["member"], &[]);
        let err = Guard::require_role(["staff"]).check(Some(&p)).unwrap_err();
        assert!(matches!(err, WardenError::Forbidden { .. }));
        assert!(err.public_message().contains("staff"));
    }

    #[test]
    fn permission_guard() {
        let p = principal(true, false, &["editor"], &["tasks:write"]);
        assert!(
            Guard::require_permission(codename("tasks:write"))
                .check(Some(&p))
                .is_ok()
        );
        let err = Guard::require_permission(codename("tasks:delete"))
            .check(Some(&p))
            .unwrap_err();
        assert!(matches!(err, WardenError::Forbidden { .. }));
    }

    #[test]
    fn superuser_bypasses_roles_and_permissions() {
        let p = principal(true, true, &[], &[]);
        for c in ["tasks:read", "users:delete", "billing:refund"] {
            assert!(Guard::require_permission(codename(c)).check(Some(&p)).is_ok());
        }
        assert!(Guard::require_role(["staff"]).check(Some(&p)).is_ok());
        assert!(Guard::require_role(Vec::<String>::new()).check(Some(&p)).is_ok());
        assert!(Guard::require_superuser().check(Some(&p)).is_ok());
    }

    #[test]
    fn inactive_overrides_superuser() {
        let p = principal(false, true, &["staff"], &["tasks:read"]);
        let err = Guard::require_permission(codename("tasks:read"))
            .check(Some(&p))
            .unwrap_err();
        assert!(matches!(err, WardenError::Forbidden { .. }));
        assert!(Guard::require_role(["staff"]).check(Some(&p)).is_err());
    }

    #[test]
    fn missing_principal_is_unauthorized() {
        let err = Guard::require_role(["staff"]).check(None).unwrap_err();
        assert!(matches!(err, WardenError::Unauthorized { .. }));
    }

    #[test]
    fn empty_role_set_denies_regular_users() {
        let p = principal(true, false, &["staff"], &[]);
        assert!(Guard::require_role(Vec::<String>::new()).check(Some(&p)).is_err());
    }

    #[test]
    fn superuser_guard_denies_regular_users() {
        let p = principal(true, false, &["staff"], &["users:read"]);
        assert!(Guard::require_superuser().check(Some(&p)).is_err());
    }

    #[test]
    fn combined_guard_requires_both() {
        let guard =
            Guard::require_role(["staff"]).and(Guard::require_permission(codename("users:manage")));
        let both = principal(true, false, &["staff"], &["users:manage"]);
        let role_only = principal(true, false, &["staff"], &["users:read"]);
        assert!(guard.check(Some(&both)).is_ok());
        assert!(guard.check(Some(&role_only)).is_err());
    }

    #[test]
    fn principal_scope_follows_superuser_flag() {
        let regular = principal(true, false, &[], &[]);
        assert_eq!(regular.tenant_scope(), TenantScope::Tenant(TenantId::new(1)));
        let root = principal(true, true, &[], &[]);
        assert_eq!(root.tenant_scope(), TenantScope::Unrestricted);
    }
}
