//! Ownership rules of the credential store: deleting a tenant, user, role or
//! permission removes or detaches everything that hangs off it.

use std::time::Duration;

use school_auth::auth::permissions::PermissionResolver;
use school_auth::auth::service::Registration;
use school_auth::models::{Permission, Role, RolePermission, Session, Tenant, User, role, session, user};
use school_auth::repositories::{PermissionRepository, RoleRepository, UserRepository};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::Map;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::TEST_PASSWORD;

const TIMEOUT: Duration = Duration::from_secs(5);

fn registration(email: &str, tenant_id: Uuid) -> Registration {
    Registration {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        tenant_id,
        role_id: None,
        profile_data: Map::new(),
    }
}

async fn users_in(db: &DatabaseConnection, tenant_id: Uuid) -> u64 {
    User::find()
        .filter(user::Column::TenantId.eq(tenant_id))
        .count(db)
        .await
        .unwrap()
}

async fn roles_in(db: &DatabaseConnection, tenant_id: Uuid) -> u64 {
    Role::find()
        .filter(role::Column::TenantId.eq(tenant_id))
        .count(db)
        .await
        .unwrap()
}

async fn sessions_of(db: &DatabaseConnection, user_id: Uuid) -> u64 {
    Session::find()
        .filter(session::Column::UserId.eq(user_id))
        .count(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_deleting_tenant_removes_its_users_roles_and_sessions() {
    let db = test_utils::setup_test_db().await.unwrap();
    let closing = test_utils::create_test_tenant(&db, "closing.example.edu")
        .await
        .unwrap();
    let staying = test_utils::create_test_tenant(&db, "staying.example.edu")
        .await
        .unwrap();
    let auth = test_utils::build_auth(&test_utils::test_config(), &db);

    let gone = auth
        .register(registration("gone@closing.edu", closing.id))
        .await
        .unwrap();
    let kept = auth
        .register(registration("kept@staying.edu", staying.id))
        .await
        .unwrap();

    assert_eq!(users_in(&db, closing.id).await, 1);
    assert_eq!(roles_in(&db, closing.id).await, 1);
    assert_eq!(sessions_of(&db, gone.user.id).await, 1);

    Tenant::delete_by_id(closing.id).exec(&db).await.unwrap();

    assert_eq!(users_in(&db, closing.id).await, 0);
    assert_eq!(roles_in(&db, closing.id).await, 0);
    assert_eq!(sessions_of(&db, gone.user.id).await, 0);

    assert_eq!(users_in(&db, staying.id).await, 1);
    assert_eq!(roles_in(&db, staying.id).await, 1);
    assert_eq!(sessions_of(&db, kept.user.id).await, 1);
    assert!(
        auth.refresh(&kept.refresh.token).await.is_ok(),
        "other tenants keep their sessions"
    );
}

#[tokio::test]
async fn test_deleting_user_removes_only_their_sessions() {
    let db = test_utils::setup_test_db().await.unwrap();
    let tenant = test_utils::create_test_tenant(&db, "users.example.edu")
        .await
        .unwrap();
    let auth = test_utils::build_auth(&test_utils::test_config(), &db);

    let leaving = auth
        .register(registration("leaving@users.edu", tenant.id))
        .await
        .unwrap();
    auth.login("leaving@users.edu", TEST_PASSWORD).await.unwrap();
    let staying = auth
        .register(registration("staying@users.edu", tenant.id))
        .await
        .unwrap();
    assert_eq!(sessions_of(&db, leaving.user.id).await, 2);

    User::delete_by_id(leaving.user.id).exec(&db).await.unwrap();

    assert_eq!(sessions_of(&db, leaving.user.id).await, 0);
    assert_eq!(sessions_of(&db, staying.user.id).await, 1);
    assert!(auth.refresh(&leaving.refresh.token).await.is_err());
    assert_eq!(
        Role::find().count(&db).await.unwrap(),
        1,
        "the tenant role outlives its members"
    );
}

#[tokio::test]
async fn test_deleting_role_detaches_users_and_drops_grants() {
    let db = test_utils::setup_test_db().await.unwrap();
    let tenant = test_utils::create_test_tenant(&db, "roles.example.edu")
        .await
        .unwrap();
    let role = test_utils::grant_permission(&db, tenant.id, "bursar", "fees:write")
        .await
        .unwrap();
    let member = test_utils::insert_user(&db, tenant.id, "bursar@roles.edu", Some(role.id))
        .await
        .unwrap();
    let resolver = PermissionResolver::new(&db, TIMEOUT);
    assert!(resolver.resolve(member.id).await.unwrap().contains("fees:write"));

    Role::delete_by_id(role.id).exec(&db).await.unwrap();

    let member = UserRepository::new(&db)
        .find_by_id(member.id)
        .await
        .unwrap()
        .expect("user survives role deletion");
    assert_eq!(member.role_id, None);
    assert!(resolver.resolve(member.id).await.unwrap().is_empty());
    assert_eq!(RolePermission::find().count(&db).await.unwrap(), 0);
    assert_eq!(Permission::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_deleting_permission_revokes_it_from_every_role() {
    let db = test_utils::setup_test_db().await.unwrap();
    let tenant = test_utils::create_test_tenant(&db, "perms.example.edu")
        .await
        .unwrap();
    let clerk = test_utils::grant_permission(&db, tenant.id, "clerk", "attendance:write")
        .await
        .unwrap();
    test_utils::grant_permission(&db, tenant.id, "clerk", "attendance:read")
        .await
        .unwrap();
    let member = test_utils::insert_user(&db, tenant.id, "clerk@perms.edu", Some(clerk.id))
        .await
        .unwrap();

    let write = PermissionRepository::new(&db)
        .find_by_key("attendance", "write")
        .await
        .unwrap()
        .unwrap();
    Permission::delete_by_id(write.id).exec(&db).await.unwrap();

    let remaining = RoleRepository::new(&db).permission_ids(clerk.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    let permissions = PermissionResolver::new(&db, TIMEOUT)
        .resolve(member.id)
        .await
        .unwrap();
    assert_eq!(
        permissions.into_iter().collect::<Vec<_>>(),
        vec!["attendance:read".to_string()]
    );
    assert!(
        RoleRepository::new(&db)
            .find_by_name(tenant.id, "clerk")
            .await
            .unwrap()
            .is_some()
    );
}
