//! Reconciles the declarative [`Registry`] with persisted permissions,
//! roles and grants.
//!
//! Sync is additive: it inserts missing rows, refreshes descriptions and
//! links roles to permissions, but never deletes anything. All writes go
//! through an [`RbacTransaction`] and land in a single database
//! transaction on commit, so a failed sync leaves the catalog untouched.

use std::collections::{HashMap, HashSet};

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::registry::Registry;

use crate::error::DbError;
use crate::repository::parse_uuid;

/// A catalog row as seen by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub description: String,
}

#[derive(Debug, SurrealValue)]
struct CatalogRow {
    record_id: String,
    description: String,
}

#[derive(Debug, Clone, SurrealValue)]
struct NewEntry {
    id: String,
    key: String,
    description: String,
}

#[derive(Debug, Clone, SurrealValue)]
struct DescriptionUpdate {
    id: String,
    description: String,
}

#[derive(Debug, Clone, SurrealValue)]
struct NewGrant {
    role_id: String,
    permission_id: String,
}

const COMMIT_SCRIPT: &str = "\
BEGIN TRANSACTION;
FOR $p IN $new_permissions {
    CREATE type::record('permission', $p.id) SET
        codename = $p.key, description = $p.description;
};
FOR $p IN $permission_updates {
    UPDATE type::record('permission', $p.id) SET
        description = $p.description, updated_at = time::now();
};
FOR $r IN $new_roles {
    CREATE type::record('role', $r.id) SET
        name = $r.key, description = $r.description;
};
FOR $r IN $role_updates {
    UPDATE type::record('role', $r.id) SET
        description = $r.description, updated_at = time::now();
};
FOR $g IN $new_grants {
    LET $from = type::record('role', $g.role_id);
    LET $to = type::record('permission', $g.permission_id);
    RELATE $from->grants->$to;
};
COMMIT TRANSACTION;
";

/// Counts of the writes a sync committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub permissions_created: usize,
    pub permissions_updated: usize,
    pub roles_created: usize,
    pub roles_updated: usize,
    pub grants_created: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Unit of work over the RBAC catalog.
///
/// Reads hit the database and are overlaid with the writes buffered so
/// far. Writes are held in memory until [`commit`](Self::commit); dropping
/// the transaction discards them.
pub struct RbacTransaction<C: Connection> {
    db: Surreal<C>,
    new_permissions: Vec<NewEntry>,
    permission_updates: Vec<DescriptionUpdate>,
    new_roles: Vec<NewEntry>,
    role_updates: Vec<DescriptionUpdate>,
    new_grants: Vec<NewGrant>,
}

impl<C: Connection> RbacTransaction<C> {
    pub(crate) fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            new_permissions: Vec::new(),
            permission_updates: Vec::new(),
            new_roles: Vec::new(),
            role_updates: Vec::new(),
            new_grants: Vec::new(),
        }
    }

    pub async fn find_permission(&self, codename: &str) -> Result<Option<CatalogEntry>, DbError> {
        if let Some(entry) = buffered(&self.new_permissions, codename) {
            return Ok(Some(entry));
        }
        let found = self.lookup("permission", "codename", codename).await?;
        Ok(found.map(|e| overlay(e, &self.permission_updates)))
    }

    pub async fn find_role(&self, name: &str) -> Result<Option<CatalogEntry>, DbError> {
        if let Some(entry) = buffered(&self.new_roles, name) {
            return Ok(Some(entry));
        }
        let found = self.lookup("role", "name", name).await?;
        Ok(found.map(|e| overlay(e, &self.role_updates)))
    }

    /// Ids of the permissions already granted to a role.
    pub async fn granted_permission_ids(&self, role_id: Uuid) -> Result<HashSet<Uuid>, DbError> {
        let role_id_str = role_id.to_string();
        let mut granted = HashSet::new();

        // Roles created in this transaction have no persisted grants.
        if !self.new_roles.iter().any(|r| r.id == role_id_str) {
            let mut result = self
                .db
                .query(
                    "SELECT VALUE meta::id(out) FROM grants \
                     WHERE in = type::record('role', $role_id)",
                )
                .bind(("role_id", role_id_str.clone()))
                .await?;
            let ids: Vec<String> = result.take(0)?;
            for id in ids {
                granted.insert(parse_uuid(&id, "permission")?);
            }
        }

        for grant in self.new_grants.iter().filter(|g| g.role_id == role_id_str) {
            granted.insert(parse_uuid(&grant.permission_id, "permission")?);
        }
        Ok(granted)
    }

    pub fn insert_permission(&mut self, codename: &str, description: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.new_permissions.push(NewEntry {
            id: id.to_string(),
            key: codename.to_string(),
            description: description.to_string(),
        });
        id
    }

    pub fn update_permission_description(&mut self, id: Uuid, description: &str) {
        set_description(
            &mut self.new_permissions,
            &mut self.permission_updates,
            id,
            description,
        );
    }

    pub fn insert_role(&mut self, name: &str, description: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.new_roles.push(NewEntry {
            id: id.to_string(),
            key: name.to_string(),
            description: description.to_string(),
        });
        id
    }

    pub fn update_role_description(&mut self, id: Uuid, description: &str) {
        set_description(&mut self.new_roles, &mut self.role_updates, id, description);
    }

    /// Buffer a grant. Duplicates within the transaction are ignored.
    pub fn insert_grant(&mut self, role_id: Uuid, permission_id: Uuid) {
        let grant = NewGrant {
            role_id: role_id.to_string(),
            permission_id: permission_id.to_string(),
        };
        let duplicate = self
            .new_grants
            .iter()
            .any(|g| g.role_id == grant.role_id && g.permission_id == grant.permission_id);
        if !duplicate {
            self.new_grants.push(grant);
        }
    }

    /// What [`commit`](Self::commit) would write.
    pub fn pending(&self) -> SyncReport {
        SyncReport {
            permissions_created: self.new_permissions.len(),
            permissions_updated: self.permission_updates.len(),
            roles_created: self.new_roles.len(),
            roles_updated: self.role_updates.len(),
            grants_created: self.new_grants.len(),
        }
    }

    /// Apply every buffered write atomically.
    pub async fn commit(self) -> Result<SyncReport, DbError> {
        let report = self.pending();
        if report.is_noop() {
            debug!("RBAC transaction has no pending writes");
            return Ok(report);
        }

        self.db
            .query(COMMIT_SCRIPT)
            .bind(("new_permissions", self.new_permissions))
            .bind(("permission_updates", self.permission_updates))
            .bind(("new_roles", self.new_roles))
            .bind(("role_updates", self.role_updates))
            .bind(("new_grants", self.new_grants))
            .await?
            .check()
            .map_err(|e| DbError::Query(format!("RBAC commit failed: {e}")))?;

        Ok(report)
    }

    /// Discard buffered writes.
    pub fn rollback(self) {
        debug!(pending = ?self.pending(), "RBAC transaction rolled back");
    }

    async fn lookup(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<CatalogEntry>, DbError> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, description FROM {table} \
             WHERE {field} = $value LIMIT 1"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("value", value.to_string()))
            .await?;
        let rows: Vec<CatalogRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| {
                Ok(CatalogEntry {
                    id: parse_uuid(&row.record_id, table)?,
                    description: row.description,
                })
            })
            .transpose()
    }
}

fn buffered(entries: &[NewEntry], key: &str) -> Option<CatalogEntry> {
    entries.iter().find(|e| e.key == key).and_then(|e| {
        Some(CatalogEntry {
            id: Uuid::parse_str(&e.id).ok()?,
            description: e.description.clone(),
        })
    })
}

fn overlay(mut entry: CatalogEntry, updates: &[DescriptionUpdate]) -> CatalogEntry {
    let id = entry.id.to_string();
    if let Some(update) = updates.iter().rev().find(|u| u.id == id) {
        entry.description = update.description.clone();
    }
    entry
}

fn set_description(
    inserts: &mut [NewEntry],
    updates: &mut Vec<DescriptionUpdate>,
    id: Uuid,
    description: &str,
) {
    let id = id.to_string();
    if let Some(entry) = inserts.iter_mut().find(|e| e.id == id) {
        entry.description = description.to_string();
        return;
    }
    match updates.iter_mut().find(|u| u.id == id) {
        Some(update) => update.description = description.to_string(),
        None => updates.push(DescriptionUpdate {
            id,
            description: description.to_string(),
        }),
    }
}

/// Ensure every registered permission exists with its current
/// description. Returns the codename to id mapping.
pub async fn sync_permissions<C: Connection>(
    tx: &mut RbacTransaction<C>,
    registry: &Registry,
) -> Result<HashMap<String, Uuid>, DbError> {
    let mut ids = HashMap::new();

    for def in registry.all_permissions() {
        let codename = def.codename.as_str();
        let id = match tx.find_permission(codename).await? {
            None => {
                info!(codename, "creating permission");
                tx.insert_permission(codename, &def.description)
            }
            Some(existing) => {
                if existing.description != def.description {
                    debug!(codename, "updating permission description");
                    tx.update_permission_description(existing.id, &def.description);
                }
                existing.id
            }
        };
        ids.insert(codename.to_string(), id);
    }

    Ok(ids)
}

/// Ensure every registered role exists and holds at least its declared
/// permissions. Codenames missing from `permission_ids` are skipped.
pub async fn sync_roles<C: Connection>(
    tx: &mut RbacTransaction<C>,
    registry: &Registry,
    permission_ids: &HashMap<String, Uuid>,
) -> Result<(), DbError> {
    for def in registry.all_roles() {
        let role_id = match tx.find_role(&def.name).await? {
            None => {
                info!(role = %def.name, "creating role");
                tx.insert_role(&def.name, &def.description)
            }
            Some(existing) => {
                if existing.description != def.description {
                    debug!(role = %def.name, "updating role description");
                    tx.update_role_description(existing.id, &def.description);
                }
                existing.id
            }
        };

        let granted = tx.granted_permission_ids(role_id).await?;
        for codename in &def.permissions {
            let Some(permission_id) = permission_ids.get(codename) else {
                warn!(role = %def.name, codename = %codename, "skipping unknown permission");
                continue;
            };
            if !granted.contains(permission_id) {
                info!(role = %def.name, codename = %codename, "granting permission");
                tx.insert_grant(role_id, *permission_id);
            }
        }
    }

    Ok(())
}

/// Synchronize the whole registry and commit.
pub async fn sync_all<C: Connection>(
    mut tx: RbacTransaction<C>,
    registry: &Registry,
) -> Result<SyncReport, DbError> {
    let permission_ids = match sync_permissions(&mut tx, registry).await {
        Ok(ids) => ids,
        Err(e) => {
            tx.rollback();
            return Err(e);
        }
    };
    if let Err(e) = sync_roles(&mut tx, registry, &permission_ids).await {
        tx.rollback();
        return Err(e);
    }

    let report = tx.commit().await?;
    info!(
        permissions = registry.all_permissions().len(),
        roles = registry.all_roles().len(),
        permissions_created = report.permissions_created,
        permissions_updated = report.permissions_updated,
        roles_created = report.roles_created,
        roles_updated = report.roles_updated,
        grants_created = report.grants_created,
        "RBAC registry synchronized"
    );
    Ok(report)
}

/// Convenience for callers holding a bare client.
pub async fn sync_registry<C: Connection>(
    db: &Surreal<C>,
    registry: &Registry,
) -> Result<SyncReport, DbError> {
    sync_all(RbacTransaction::new(db.clone()), registry).await
}
