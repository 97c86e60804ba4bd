//! Declarative catalog of permissions and default roles.
//!
//! Each feature area registers what it needs on a [`RegistryBuilder`]
//! during bootstrap; the builder is then frozen into a [`Registry`] that is
//! read-only for the rest of the process and safe to share across
//! threads. The registry has no persistence of its own: `warden-db` syncs it
//! into storage at startup.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::WardenResult;
use crate::models::permission::Codename;

/// A permission declared by a feature area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDef {
    pub codename: Codename,
    pub description: String,
}

/// A default role and the codenames it should grant.
///
/// Codenames are kept as declared; entries that are not registered
/// permissions are skipped when the role is synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDef {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    permissions: BTreeMap<String, PermissionDef>,
    roles: BTreeMap<String, RoleDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) a permission. A malformed codename is
    /// rejected; registering the same codename twice keeps the last
    /// description.
    pub fn register_permission(
        &mut self,
        codename: &str,
        description: &str,
    ) -> WardenResult<&mut Self> {
        let codename = Codename::parse(codename)?;
        self.permissions.insert(
            codename.to_string(),
            PermissionDef {
                codename,
                description: description.to_string(),
            },
        );
        Ok(self)
    }

    /// Register (or overwrite) a default role. An empty slice yields a role
    /// without permissions.
    pub fn register_role(
        &mut self,
        name: &str,
        description: &str,
        permission_codenames: &[&str],
    ) -> &mut Self {
        self.roles.insert(
            name.to_string(),
            RoleDef {
                name: name.to_string(),
                description: description.to_string(),
                permissions: permission_codenames
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            },
        );
        self
    }

    /// Freeze the catalog.
    pub fn build(self) -> Registry {
        Registry {
            permissions: self.permissions,
            roles: self.roles,
        }
    }
}

/// Frozen, read-only catalog.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    permissions: BTreeMap<String, PermissionDef>,
    roles: BTreeMap<String, RoleDef>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn all_permissions(&self) -> Vec<&PermissionDef> {
        self.permissions.values().collect()
    }

    pub fn all_roles(&self) -> Vec<&RoleDef> {
        self.roles.values().collect()
    }

    pub fn get_permission(&self, codename: &str) -> Option<&PermissionDef> {
        self.permissions.get(codename)
    }

    pub fn get_role(&self, name: &str) -> Option<&RoleDef> {
        self.roles.get(name)
    }

    pub fn codenames(&self) -> BTreeSet<&str> {
        self.permissions.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }
}
