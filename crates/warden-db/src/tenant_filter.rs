//! WHERE-clause fragments enforcing tenant visibility.
//!
//! Every scoped query interpolates [`clause`] and binds `$scope_tenant`
//! via [`TenantFilter::binding`]. The fragment never contains user input.

use warden_core::tenant::{IsolationMode, TenantScope};

/// Tenant predicate for one table under one scope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TenantFilter {
    scope: TenantScope,
    mode: IsolationMode,
}

impl TenantFilter {
    pub(crate) fn new(scope: TenantScope, mode: IsolationMode) -> Self {
        Self { scope, mode }
    }

    /// Boolean SurrealQL expression over the row's `tenant_id` field.
    pub(crate) fn clause(&self) -> &'static str {
        match (self.scope, self.mode) {
            (TenantScope::Unrestricted, _) => "true",
            (TenantScope::Tenant(_), IsolationMode::Inclusive) => {
                "(tenant_id = $scope_tenant OR tenant_id = NONE)"
            }
            (TenantScope::Tenant(_), IsolationMode::Strict) => "tenant_id = $scope_tenant",
            (TenantScope::Anonymous, IsolationMode::Inclusive) => "tenant_id = NONE",
            (TenantScope::Anonymous, IsolationMode::Strict) => "false",
        }
    }

    /// Value for `$scope_tenant`; bound on every scoped query.
    pub(crate) fn binding(&self) -> (&'static str, Option<i64>) {
        ("scope_tenant", self.scope.tenant_id().map(|t| t.get()))
    }

    /// Whether this filter can match anything at all.
    pub(crate) fn is_empty(&self) -> bool {
        matches!(
            (self.scope, self.mode),
            (TenantScope::Anonymous, IsolationMode::Strict)
        )
    }
}
