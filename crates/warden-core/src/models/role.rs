//! Role domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Codename;
use crate::tenant::TenantId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// `None` = global role shared by all tenants.
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
    pub tenant_id: Option<TenantId>,
}

/// A role together with the codenames it grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    pub role: Role,
    pub permissions: Vec<Codename>,
}

impl RoleWithPermissions {
    pub fn grants(&self, codename: &str) -> bool {
        self.permissions.iter().any(|p| p.as_str() == codename)
    }
}
