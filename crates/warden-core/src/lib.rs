//! Warden Core: domain models, the RBAC registry, the tenant isolation
//! policy and the authorization decision procedure.
//!
//! This crate performs no IO. Storage lives in `warden-db`, token handling
//! in `warden-auth`.

pub mod authz;
pub mod error;
pub mod models;
pub mod registry;
pub mod repository;
pub mod tenant;

pub use authz::{Guard, Principal, Requirement, TrustModel};
pub use error::{WardenError, WardenResult};
pub use registry::{PermissionDef, Registry, RegistryBuilder, RoleDef};
pub use tenant::{IsolationMode, TenantId, TenantScope};
