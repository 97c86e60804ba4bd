//! Tenant-scoped storage sessions.
//!
//! Repositories are only reachable through a [`Session`], and a session
//! carries its [`TenantScope`] from the moment it is opened, so a query
//! cannot be issued without the tenant predicate.

use surrealdb::{Connection, Surreal};
use tracing::debug;
use warden_core::tenant::TenantScope;

use crate::repository::{
    SurrealPermissionRepository, SurrealRefreshTokenRepository, SurrealRoleRepository,
    SurrealUserRepository,
};
use crate::sync::RbacTransaction;

/// Entry point to storage. Cheap to clone.
#[derive(Clone)]
pub struct Store<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Store<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Open a session whose reads are filtered by `scope`.
    pub fn session(&self, scope: TenantScope) -> Session<C> {
        debug!(%scope, "opening storage session");
        Session {
            db: self.db.clone(),
            scope,
        }
    }

    /// Unfiltered session for bootstrap, maintenance and credential lookup.
    pub fn system(&self) -> Session<C> {
        self.session(TenantScope::Unrestricted)
    }

    /// Begin a buffered unit of work for catalog synchronization.
    pub fn begin_rbac(&self) -> RbacTransaction<C> {
        RbacTransaction::new(self.db.clone())
    }

    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }
}

/// Repositories bound to one tenant scope.
#[derive(Clone)]
pub struct Session<C: Connection> {
    db: Surreal<C>,
    scope: TenantScope,
}

impl<C: Connection> Session<C> {
    pub fn scope(&self) -> TenantScope {
        self.scope
    }

    pub fn permissions(&self) -> SurrealPermissionRepository<C> {
        SurrealPermissionRepository::new(self.db.clone(), self.scope)
    }

    pub fn roles(&self) -> SurrealRoleRepository<C> {
        SurrealRoleRepository::new(self.db.clone(), self.scope)
    }

    pub fn users(&self) -> SurrealUserRepository<C> {
        SurrealUserRepository::new(self.db.clone(), self.scope)
    }

    /// The token ledger is keyed by token digest, not tenant.
    pub fn refresh_tokens(&self) -> SurrealRefreshTokenRepository<C> {
        SurrealRefreshTokenRepository::new(self.db.clone())
    }
}
