//! Warden: bootstraps storage and the RBAC catalog, and runs
//! administrative commands.

mod catalog;
mod logging;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use surrealdb::{Connection, Surreal};
use tracing::info;
use warden_auth::AuthService;
use warden_core::repository::{Pagination, PermissionRepository, RoleRepository};
use warden_db::{DbManager, Store, SyncReport};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Multi-tenant RBAC authorization core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (TOML). Missing files are ignored.
    #[arg(short, long, default_value = "warden.toml", env = "WARDEN_CONFIG")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Apply schema migrations and synchronize the RBAC catalog
    Migrate,

    /// Provision a superuser account
    CreateSuperuser {
        #[arg(long)]
        email: String,

        #[arg(long, env = "WARDEN_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Delete expired refresh tokens
    CleanupTokens,

    /// Print persisted roles and permissions
    Permissions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    logging::init(&settings.log)?;

    let manager = DbManager::connect(&settings.database)
        .await
        .context("connecting to SurrealDB")?;
    let store = manager.store();
    let report = bootstrap(manager.client(), &store).await?;

    match cli.command {
        Command::Migrate => {
            println!(
                "catalog synchronized: {} permissions and {} roles created, \
                 {} grants added",
                report.permissions_created, report.roles_created, report.grants_created
            );
        }
        Command::CreateSuperuser { email, password } => {
            let system = store.system();
            let auth = AuthService::new(system.users(), system.refresh_tokens(), settings.auth);
            let user = auth
                .create_superuser(&email, &password)
                .await
                .map_err(|e| anyhow::anyhow!(e.public_message()))?;
            println!("superuser {} created ({})", user.email, user.id);
        }
        Command::CleanupTokens => {
            let system = store.system();
            let auth = AuthService::new(system.users(), system.refresh_tokens(), settings.auth);
            let removed = auth.cleanup_expired().await?;
            println!("removed {removed} expired refresh tokens");
        }
        Command::Permissions => print_catalog(&store).await?,
    }

    Ok(())
}

/// Migrations and the startup sync. Any failure aborts the process before
/// it serves anything.
async fn bootstrap<C: Connection>(
    db: &Surreal<C>,
    store: &Store<C>,
) -> anyhow::Result<SyncReport> {
    warden_db::run_migrations(db)
        .await
        .context("applying migrations")?;

    let registry = catalog::build().context("building the RBAC registry")?;
    let report = warden_db::sync_all(store.begin_rbac(), &registry)
        .await
        .context("synchronizing the RBAC registry")?;

    info!(
        permissions = registry.all_permissions().len(),
        roles = registry.all_roles().len(),
        "bootstrap complete"
    );
    Ok(report)
}

async fn print_catalog<C: Connection>(store: &Store<C>) -> anyhow::Result<()> {
    let system = store.system();
    let all = Pagination {
        offset: 0,
        limit: 1000,
    };

    println!("Roles:");
    for role in system.roles().list(all.clone()).await?.items {
        let codenames: Vec<String> = system
            .roles()
            .get_permissions(role.id)
            .await?
            .into_iter()
            .map(|p| p.codename.to_string())
            .collect();
        println!("  {:<12} {} [{}]", role.name, role.description, codenames.join(", "));
    }

    println!("Permissions:");
    for permission in system.permissions().list(all).await?.items {
        println!("  {:<16} {}", permission.codename.to_string(), permission.description);
    }
    Ok(())
}
