//! HTTP-level tests for the `/auth` surface, driven in-process and over a
//! real socket.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use school_auth::models::tenant::Model as TenantModel;
use school_auth::server::create_app;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::TEST_PASSWORD;

struct TestApp {
    app: Router,
    db: DatabaseConnection,
    tenant: TenantModel,
}

async fn test_app() -> TestApp {
    let db = test_utils::setup_test_db().await.unwrap();
    let tenant = test_utils::create_test_tenant(&db, "t1.example.edu")
        .await
        .unwrap();
    let state = test_utils::build_state(test_utils::test_config(), db.clone());
    TestApp {
        app: create_app(state),
        db,
        tenant,
    }
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register(app: &TestApp, email: &str) -> Value {
    let (status, body) = call(
        &app.app,
        post_json(
            "/auth/register",
            json!({
                "email": email,
                "password": TEST_PASSWORD,
                "tenant_id": app.tenant.id,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body
}

#[tokio::test]
async fn test_register_returns_tokens_and_public_user() {
    let app = test_app().await;

    let body = register(&app, "alice@example.com").await;

    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 30 * 60);
    assert!(body["access_token"].as_str().unwrap().len() > 20);
    assert!(body["refresh_token"].as_str().unwrap().len() > 20);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["tenant_id"], app.tenant.id.to_string());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_default_role_user_has_empty_permissions() {
    let app = test_app().await;
    let body = register(&app, "alice@example.com").await;
    let token = body["access_token"].as_str().unwrap();

    let (status, permissions) = call(&app.app, get_with_token("/auth/permissions", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permissions, json!([]));

    let (status, me) = call(&app.app, get_with_token("/auth/me", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"]["name"], "user");
    assert_eq!(me["tenant"]["id"], app.tenant.id.to_string());
    assert_eq!(me["user"]["id"], body["user"]["id"]);
    assert_eq!(me["permissions"], json!([]));
}

#[tokio::test]
async fn test_login_errors_share_one_message() {
    let app = test_app().await;
    register(&app, "alice@example.com").await;

    let (wrong_status, wrong_body) = call(
        &app.app,
        post_json(
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "WrongPass999" }),
        ),
    )
    .await;
    let (unknown_status, unknown_body) = call(
        &app.app,
        post_json(
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
        ),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["message"], "Incorrect email or password");
    assert_eq!(wrong_body["message"], unknown_body["message"]);
    assert_eq!(wrong_body["code"], unknown_body["code"]);
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let app = test_app().await;

    let (status, body) = call(
        &app.app,
        post_json(
            "/auth/register",
            json!({ "email": "weak@example.com", "password": "weak", "tenant_id": app.tenant.id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["details"].is_object());

    register(&app, "alice@example.com").await;
    let (status, body) = call(
        &app.app,
        post_json(
            "/auth/register",
            json!({
                "email": "alice@example.com",
                "password": TEST_PASSWORD,
                "tenant_id": app.tenant.id,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already registered");

    let (status, body) = call(
        &app.app,
        post_json(
            "/auth/register",
            json!({
                "email": "new@example.com",
                "password": TEST_PASSWORD,
                "tenant_id": uuid::Uuid::new_v4(),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid tenant ID");
}

#[tokio::test]
async fn test_refresh_and_logout_lifecycle() {
    let app = test_app().await;
    let body = register(&app, "alice@example.com").await;
    let refresh_token = body["refresh_token"].as_str().unwrap();

    let (status, refreshed) = call(
        &app.app,
        post_json("/auth/refresh", json!({ "refresh_token": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["token_type"], "bearer");
    let (status, _) = call(
        &app.app,
        get_with_token("/auth/me", refreshed["access_token"].as_str().unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..2 {
        let (status, logout) = call(
            &app.app,
            post_json("/auth/logout", json!({ "refresh_token": refresh_token })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logout["success"], true);
        assert_eq!(logout["message"], "Successfully logged out");
    }

    let (status, body) = call(
        &app.app,
        post_json("/auth/refresh", json!({ "refresh_token": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");
}

#[tokio::test]
async fn test_authorize_endpoint() {
    let app = test_app().await;
    let role = test_utils::grant_permission(&app.db, app.tenant.id, "registrar", "students:read")
        .await
        .unwrap();
    let (status, body) = call(
        &app.app,
        post_json(
            "/auth/register",
            json!({
                "email": "registrar@example.com",
                "password": TEST_PASSWORD,
                "tenant_id": app.tenant.id,
                "role_id": role.id,
                "profile_data": { "department": "admissions" },
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["profile_data"]["department"], "admissions");
    let token = body["access_token"].as_str().unwrap();

    let (status, allowed) = call(
        &app.app,
        get_with_token("/auth/authorize?permission=students:read", token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(allowed, json!({ "allowed": true, "permission": "students:read" }));

    let (status, denied) = call(
        &app.app,
        get_with_token("/auth/authorize?permission=students:write", token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(denied["code"], "FORBIDDEN");

    let (status, _) = call(&app.app, get_with_token("/auth/authorize", token)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, permissions) = call(&app.app, get_with_token("/auth/permissions", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permissions, json!(["students:read"]));
}

#[tokio::test]
async fn test_refresh_token_is_not_accepted_as_bearer() {
    let app = test_app().await;
    let body = register(&app, "alice@example.com").await;

    let (status, body) = call(
        &app.app,
        get_with_token("/auth/me", body["refresh_token"].as_str().unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Could not validate credentials");
}

#[tokio::test]
async fn test_whoami_ignores_malformed_tenant_hint() {
    let app = test_app().await;
    let body = register(&app, "alice@example.com").await;
    let token = body["access_token"].as_str().unwrap();

    let request = Request::builder()
        .uri("/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header("X-Tenant-ID", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, me) = call(&app.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "alice@example.com");
    assert_eq!(me["tenant"]["id"], app.tenant.id.to_string());

    let (status, me) = call(
        &app.app,
        get_with_token(&format!("/auth/me?tenant_id={}", uuid::Uuid::new_v4()), token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "a foreign tenant hint is not enforced");
    assert_eq!(me["tenant"]["id"], app.tenant.id.to_string());

    let request = Request::builder()
        .uri("/auth/me")
        .header("X-Tenant-ID", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&app.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Could not validate credentials");
}

#[tokio::test]
async fn test_full_flow_over_socket() {
    let db = test_utils::setup_test_db().await.unwrap();
    let tenant = test_utils::create_test_tenant(&db, "socket.example.edu")
        .await
        .unwrap();
    let state = test_utils::build_state(test_utils::test_config(), db);
    let (base_url, handle) = test_utils::spawn_test_app(state).await.unwrap();
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let response = client
        .post(format!("{base_url}/auth/register"))
        .json(&json!({
            "email": "socket@example.com",
            "password": TEST_PASSWORD,
            "tenant_id": tenant.id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let response = client
        .post(format!("{base_url}/auth/login"))
        .header("x-request-id", "socket-req-1")
        .json(&json!({ "email": "socket@example.com", "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["x-trace-id"], "socket-req-1");
    let login: Value = response.json().await.unwrap();

    let me: Value = client
        .get(format!("{base_url}/auth/me"))
        .bearer_auth(login["access_token"].as_str().unwrap())
        .header("X-Tenant-ID", tenant.id.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["user"]["email"], "socket@example.com");

    let response = client
        .get(format!("{base_url}/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");

    handle.shutdown().await.unwrap();
}
