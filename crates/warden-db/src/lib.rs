//! Warden Database: SurrealDB storage for the RBAC catalog, users and the
//! refresh-token ledger.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema migrations ([`run_migrations`])
//! - Tenant-scoped sessions handing out repositories ([`Store`], [`Session`])
//! - Registry synchronization ([`sync_all`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod store;
pub mod sync;
mod tenant_filter;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::hash_refresh_token;
pub use schema::{latest_version, run_migrations};
pub use store::{Session, Store};
pub use sync::{RbacTransaction, SyncReport, sync_all, sync_permissions, sync_roles};
