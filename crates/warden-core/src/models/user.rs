//! User domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Codename;
use super::role::RoleWithPermissions;
use crate::tenant::TenantId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    /// Already hashed; the storage layer never sees plaintext passwords.
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    /// `Some(Some(t))` = move to tenant, `Some(None)` = clear, `None` = no change.
    pub tenant_id: Option<Option<TenantId>>,
}

/// A user with its role associations loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWithRoles {
    pub user: User,
    pub roles: Vec<RoleWithPermissions>,
}

impl UserWithRoles {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.role.name == name)
    }

    /// Superusers hold every permission; everyone else needs a role
    /// granting it.
    pub fn has_permission(&self, codename: &str) -> bool {
        if self.user.is_superuser {
            return true;
        }
        self.roles.iter().any(|r| r.grants(codename))
    }

    /// Union of the codenames granted by all associated roles.
    pub fn all_permissions(&self) -> BTreeSet<Codename> {
        self.roles
            .iter()
            .flat_map(|r| r.permissions.iter().cloned())
            .collect()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.role.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;

    fn role(name: &str, perms: &[&str]) -> RoleWithPermissions {
        RoleWithPermissions {
            role: Role {
                id: Uuid::new_v4(),
                name: name.into(),
                description: String::new(),
                tenant_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            permissions: perms.iter().map(|p| Codename::parse(*p).unwrap()).collect(),
        }
    }

    fn user(is_superuser: bool, roles: Vec<RoleWithPermissions>) -> UserWithRoles {
        UserWithRoles {
            user: User {
                id: Uuid::new_v4(),
                email: "a@example.com".into(),
                hashed_password: "x".into(),
                is_active: true,
                is_superuser,
                tenant_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            roles,
        }
    }

    #[test]
    fn permission_is_inherited_from_role() {
        let u = user(false, vec![role("editor", &["a:b"])]);
        assert!(u.has_role("editor"));
        assert!(u.has_permission("a:b"));
        assert!(!u.has_permission("c:d"));
    }

    #[test]
    fn another_role_can_grant_the_missing_permission() {
        let u = user(false, vec![role("editor", &["a:b"]), role("auditor", &["c:d"])]);
        assert!(u.has_permission("c:d"));
        let all: Vec<_> = u.all_permissions().into_iter().map(String::from).collect();
        assert_eq!(all, vec!["a:b", "c:d"]);
    }

    #[test]
    fn superuser_has_every_permission_without_roles() {
        let u = user(true, vec![]);
        assert!(u.has_permission("anything:at_all"));
        assert!(!u.has_role("admin"));
        assert!(u.all_permissions().is_empty());
    }
}
