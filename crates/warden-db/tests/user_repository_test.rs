//! Integration tests for the user repository and role loading.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use warden_core::error::WardenError;
use warden_core::models::user::{CreateUser, UpdateUser};
use warden_core::registry::Registry;
use warden_core::models::role::CreateRole;
use warden_core::repository::{PermissionRepository, RoleRepository, UserRepository};
use warden_core::tenant::TenantId;
use warden_db::{Store, sync_all};

async fn store() -> Store<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    let mut builder = Registry::builder();
    builder
        .register_permission("users:read", "View user accounts")
        .unwrap()
        .register_permission("users:manage", "Create and update users")
        .unwrap();
    builder
        .register_role("staff", "Staff", &["users:read", "users:manage"])
        .register_role("support", "Support", &["users:read"]);
    let store = Store::new(db);
    sync_all(store.begin_rbac(), &builder.build()).await.unwrap();
    store
}

fn new_user(email: &str) -> CreateUser {
    CreateUser {
        email: email.into(),
        hashed_password: "$argon2id$placeholder".into(),
        is_active: true,
        is_superuser: false,
        tenant_id: Some(TenantId::new(1)),
    }
}

#[tokio::test]
async fn create_and_fetch_user() {
    let store = store().await;
    let users = store.system().users();

    let created = users.create(new_user("alice@example.com")).await.unwrap();
    let fetched = users.get_by_email("alice@example.com").await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.tenant_id, Some(TenantId::new(1)));
    assert!(fetched.is_active);
    assert!(!fetched.is_superuser);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let store = store().await;
    let users = store.system().users();

    users.create(new_user("alice@example.com")).await.unwrap();
    let result = users.create(new_user("alice@example.com")).await;
    assert!(matches!(result, Err(WardenError::AlreadyExists { .. })));
}

#[tokio::test]
async fn roles_and_permissions_are_loaded_together() {
    let store = store().await;
    let session = store.system();
    let users = session.users();

    let user = users.create(new_user("alice@example.com")).await.unwrap();
    for name in ["staff", "support"] {
        let role = session.roles().get_by_name(name).await.unwrap();
        users.assign_role(user.id, role.id).await.unwrap();
        // Second assignment is a no-op.
        users.assign_role(user.id, role.id).await.unwrap();
    }

    let loaded = users.get_with_roles(user.id).await.unwrap();
    assert_eq!(loaded.role_names(), vec!["staff", "support"]);
    assert!(loaded.has_permission("users:manage"));
    assert!(!loaded.has_permission("tasks:read"));
    let codenames: Vec<String> = loaded
        .all_permissions()
        .into_iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(codenames, vec!["users:manage", "users:read"]);
}

#[tokio::test]
async fn unassigning_a_role_removes_its_permissions() {
    let store = store().await;
    let session = store.system();
    let users = session.users();

    let user = users.create(new_user("alice@example.com")).await.unwrap();
    let staff = session.roles().get_by_name("staff").await.unwrap();
    users.assign_role(user.id, staff.id).await.unwrap();
    assert!(users.unassign_role(user.id, staff.id).await.unwrap());
    assert!(!users.unassign_role(user.id, staff.id).await.unwrap());

    let loaded = users.get_with_roles(user.id).await.unwrap();
    assert!(loaded.roles.is_empty());
    assert!(!loaded.has_permission("users:read"));
}

#[tokio::test]
async fn revoking_a_grant_removes_only_that_permission() {
    let store = store().await;
    let session = store.system();
    let roles = session.roles();

    let staff = roles.get_by_name("staff").await.unwrap();
    let manage = session
        .permissions()
        .get_by_codename("users:manage")
        .await
        .unwrap();

    assert!(roles.revoke_permission(staff.id, manage.id).await.unwrap());
    assert!(!roles.revoke_permission(staff.id, manage.id).await.unwrap());

    let left: Vec<String> = roles
        .get_permissions(staff.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.codename.to_string())
        .collect();
    assert_eq!(left, vec!["users:read"]);
}

#[tokio::test]
async fn concurrent_duplicates_surface_as_conflicts() {
    let store = store().await;
    let session = store.system();
    let (users_a, users_b) = (session.users(), session.users());

    let (a, b) = tokio::join!(
        users_a.create(new_user("race@example.com")),
        users_b.create(new_user("race@example.com")),
    );
    let errors: Vec<WardenError> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], WardenError::AlreadyExists { .. }));
    assert_eq!(errors[0].status_code(), 409);

    let role = || CreateRole {
        name: "auditor".into(),
        description: "Read-only auditor".into(),
        tenant_id: None,
    };
    let (roles_a, roles_b) = (session.roles(), session.roles());
    let (a, b) = tokio::join!(roles_a.create(role()), roles_b.create(role()));
    let errors: Vec<WardenError> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], WardenError::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let store = store().await;
    let users = store.system().users();

    let user = users.create(new_user("alice@example.com")).await.unwrap();
    let updated = users
        .update(
            user.id,
            UpdateUser {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert_eq!(updated.email, "alice@example.com");
    assert_eq!(updated.tenant_id, Some(TenantId::new(1)));

    let cleared = users
        .update(
            user.id,
            UpdateUser {
                tenant_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.tenant_id, None);
}

#[tokio::test]
async fn update_rejects_taken_email() {
    let store = store().await;
    let users = store.system().users();

    users.create(new_user("alice@example.com")).await.unwrap();
    let bob = users.create(new_user("bob@example.com")).await.unwrap();
    let result = users
        .update(
            bob.id,
            UpdateUser {
                email: Some("alice@example.com".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(WardenError::AlreadyExists { .. })));
}
