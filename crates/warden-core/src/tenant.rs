//! Tenant isolation policy.
//!
//! Tenants are not modeled as entities here: a `tenant_id` is a raw
//! integer carried on permissions, roles and users. Visibility of a row to
//! a caller is decided by the caller's [`TenantScope`] and the table's
//! [`IsolationMode`].
//!
//! | scope            | inclusive (role, permission) | strict (user)     |
//! |------------------|------------------------------|-------------------|
//! | `Unrestricted`   | every row                    | every row         |
//! | `Tenant(t)`      | `tenant_id = t` or unset     | `tenant_id = t`   |
//! | `Anonymous`      | `tenant_id` unset            | nothing           |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i64);

impl TenantId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Interpret a raw token claim as a tenant id.
    ///
    /// Integers and decimal-integer strings are accepted. Anything else
    /// (floats, booleans, free text, `null`) yields `None`.
    pub fn from_claim(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// How a table treats rows whose `tenant_id` is unset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IsolationMode {
    /// Unset tenant means global: visible to every tenant.
    Inclusive,
    /// Unset tenant is never visible outside an unrestricted scope.
    Strict,
}

/// The tenant context of one request, fixed when a storage session is
/// opened.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TenantScope {
    /// No filtering at all: superusers and system bootstrap tasks.
    Unrestricted,
    /// Scoped to exactly one tenant.
    Tenant(TenantId),
    /// No (or unresolvable) tenant context.
    #[default]
    Anonymous,
}

impl TenantScope {
    /// Scope for an authenticated principal. Superusers are exempt from
    /// tenant filtering.
    pub fn for_principal(is_superuser: bool, tenant_id: Option<TenantId>) -> Self {
        if is_superuser {
            return TenantScope::Unrestricted;
        }
        match tenant_id {
            Some(t) => TenantScope::Tenant(t),
            None => TenantScope::Anonymous,
        }
    }

    /// Whether a row carrying `row_tenant` is visible under `mode`.
    pub fn admits(&self, mode: IsolationMode, row_tenant: Option<TenantId>) -> bool {
        match (self, mode) {
            (TenantScope::Unrestricted, _) => true,
            (TenantScope::Tenant(t), IsolationMode::Inclusive) => {
                row_tenant.is_none() || row_tenant == Some(*t)
            }
            (TenantScope::Tenant(t), IsolationMode::Strict) => row_tenant == Some(*t),
            (TenantScope::Anonymous, IsolationMode::Inclusive) => row_tenant.is_none(),
            (TenantScope::Anonymous, IsolationMode::Strict) => false,
        }
    }

    /// Whether rows carrying `row_tenant` may be written. Global rows are
    /// shared by every tenant, so only an unrestricted scope writes them.
    pub fn may_write(&self, row_tenant: Option<TenantId>) -> bool {
        self.admits(IsolationMode::Strict, row_tenant)
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            TenantScope::Tenant(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantScope::Unrestricted => f.write_str("unrestricted"),
            TenantScope::Tenant(t) => write!(f, "tenant:{t}"),
            TenantScope::Anonymous => f.write_str("anonymous"),
        }
    }
}
