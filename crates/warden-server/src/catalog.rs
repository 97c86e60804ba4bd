//! The permission and role catalog this deployment registers at startup.
//!
//! Each feature area contributes its own permissions; default roles are
//! registered last so they can reference any of them.

use warden_core::error::WardenResult;
use warden_core::registry::{Registry, RegistryBuilder};

fn register_user_permissions(builder: &mut RegistryBuilder) -> WardenResult<()> {
    builder
        .register_permission("users:read", "View user accounts")?
        .register_permission("users:manage", "Create and update users")?
        .register_permission("users:delete", "Delete user accounts")?;
    Ok(())
}

fn register_task_permissions(builder: &mut RegistryBuilder) -> WardenResult<()> {
    builder
        .register_permission("tasks:read", "View tasks")?
        .register_permission("tasks:write", "Create and edit tasks")?
        .register_permission("tasks:delete", "Delete tasks")?;
    Ok(())
}

fn register_default_roles(builder: &mut RegistryBuilder) {
    builder
        .register_role(
            "staff",
            "Staff member with user management access",
            &["users:read", "users:manage"],
        )
        .register_role(
            "support",
            "Support staff with read-only access",
            &["users:read"],
        );
}

/// Build the frozen registry.
pub fn build() -> WardenResult<Registry> {
    let mut builder = Registry::builder();
    register_user_permissions(&mut builder)?;
    register_task_permissions(&mut builder)?;
    register_default_roles(&mut builder);
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_references_registered_permissions() {
        let registry = build().unwrap();
        let codenames = registry.codenames();
        for role in registry.all_roles() {
            for codename in &role.permissions {
                assert!(codenames.contains(codename.as_str()), "{codename}");
            }
        }
    }

    #[test]
    fn catalog_contents() {
        let registry = build().unwrap();
        assert_eq!(registry.all_permissions().len(), 6);
        assert_eq!(
            registry.get_role("support").map(|r| r.permissions.clone()),
            Some(vec!["users:read".to_string()])
        );
    }
}
