use std::net::TcpListener;

use acme_auth::auth::{verify_token, TokenKind};
use acme_auth::configuration::AuthSettings;
use acme_auth::startup::run;
use acme_auth::store::{hash_refresh_token, InMemoryStore};
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub store: InMemoryStore,
    pub settings: AuthSettings,
}

fn test_settings() -> AuthSettings {
    AuthSettings {
        access_secret: "integration-access-secret-32-chars!!!!".to_string(),
        refresh_secret: "integration-refresh-secret-32-chars!!!".to_string(),
        issuer: "com.acme.api".to_string(),
        audience: "com.acme.web".to_string(),
        access_token_ttl: 900,
        refresh_token_ttl: 2_592_000,
    }
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = InMemoryStore::new();
    let settings = test_settings();
    let server = run(listener, store.clone(), settings.clone()).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        settings,
    }
}

async fn register_user(app: &TestApp, client: &reqwest::Client, email: &str, password: &str) {
    let response = client
        .post(format!("{}/auth/register", &app.address))
        .json(&json!({ "email": email, "password": password, "name": "Test User" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());
}

async fn login_user(
    app: &TestApp,
    client: &reqwest::Client,
    email: &str,
    password: &str,
) -> (String, String) {
    let response = client
        .post(format!("{}/auth/login", &app.address))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

// --- Health check ---

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health_check", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_and_no_tokens() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/register", &app.address))
        .json(&json!({
            "email": "john@example.com",
            "password": "SecurePass123",
            "name": "John Doe"
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "john@example.com");
    // Registration does not issue tokens; login does.
    assert!(body.get("access_token").is_none());
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
async fn register_returns_400_for_invalid_email() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    for invalid_email in ["notanemail", "user@", "@example.com", "user@@example.com"] {
        let response = client
            .post(format!("{}/auth/register", &app.address))
            .json(&json!({ "email": invalid_email, "password": "SecurePass123" }))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            400,
            response.status().as_u16(),
            "Should reject invalid email: {}",
            invalid_email
        );
    }
}

#[tokio::test]
async fn register_duplicate_email_returns_409() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "dup@example.com", "SecurePass123").await;

    let response = client
        .post(format!("{}/auth/register", &app.address))
        .json(&json!({ "email": "dup@example.com", "password": "OtherPass456" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(409, response.status().as_u16());
}

// --- Login ---

#[tokio::test]
async fn login_returns_token_pair() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;
    let (access, refresh) = login_user(&app, &client, "a@x.com", "SecurePass123").await;

    // Both tokens verify against their own kind, and kinds are disjoint.
    assert!(verify_token(TokenKind::Access, &access, &app.settings).is_ok());
    assert!(verify_token(TokenKind::Refresh, &refresh, &app.settings).is_ok());
    assert!(verify_token(TokenKind::Refresh, &access, &app.settings).is_err());
}

#[tokio::test]
async fn login_unknown_email_and_wrong_password_return_identical_401() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;

    let unknown = client
        .post(format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "nobody@x.com", "password": "SecurePass123" }))
        .send()
        .await
        .expect("Failed to execute request.");
    let wrong = client
        .post(format!("{}/auth/login", &app.address))
        .json(&json!({ "email": "a@x.com", "password": "WrongPass999" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, unknown.status().as_u16());
    assert_eq!(401, wrong.status().as_u16());

    // Same error code either way: no account enumeration.
    let unknown_body: Value = unknown.json().await.unwrap();
    let wrong_body: Value = wrong.json().await.unwrap();
    assert_eq!(unknown_body["code"], wrong_body["code"]);
    assert_eq!(unknown_body["message"], wrong_body["message"]);
}

#[tokio::test]
async fn login_stores_only_a_hash_of_the_refresh_token() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;
    let (_, refresh) = login_user(&app, &client, "a@x.com", "SecurePass123").await;

    let claims = verify_token(TokenKind::Refresh, &refresh, &app.settings).unwrap();
    let row = app.store.session(&claims.jti).await.expect("session row missing");

    assert_ne!(row.refresh_token_hash, refresh);
    assert_eq!(row.refresh_token_hash, hash_refresh_token(&refresh));
}

// --- Refresh / rotation ---

#[tokio::test]
async fn refresh_rotates_and_old_token_is_single_use() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;
    let (_, refresh) = login_user(&app, &client, "a@x.com", "SecurePass123").await;

    let response = client
        .post(format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    let new_refresh = body["refresh_token"].as_str().unwrap();
    assert_ne!(new_refresh, refresh);

    // Replay of the rotated-away token is rejected.
    let replay = client
        .post(format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, replay.status().as_u16());

    // The successor still works.
    let successor = client
        .post(format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": new_refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, successor.status().as_u16());
}

#[tokio::test]
async fn refresh_with_garbage_token_returns_401() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": "not.a.jwt" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn rotation_links_sessions_into_an_acyclic_chain() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;
    let (_, mut refresh) = login_user(&app, &client, "a@x.com", "SecurePass123").await;
    let root = verify_token(TokenKind::Refresh, &refresh, &app.settings)
        .unwrap()
        .jti;

    for _ in 0..3 {
        let response = client
            .post(format!("{}/auth/refresh", &app.address))
            .json(&json!({ "refresh_token": refresh }))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        refresh = body["refresh_token"].as_str().unwrap().to_string();
    }

    // Walk the replaced_by chain: revoked nodes all the way to the one
    // active tail, no revisits.
    let mut seen = std::collections::HashSet::new();
    let mut cursor = Some(root);
    let mut active = 0;
    while let Some(id) = cursor {
        assert!(seen.insert(id.clone()), "chain revisited {}", id);
        let row = app.store.session(&id).await.expect("chain node missing");
        if row.is_revoked {
            assert!(row.replaced_by.is_some(), "revoked node with no successor");
        } else {
            active += 1;
            assert!(row.replaced_by.is_none(), "active node with a successor");
        }
        cursor = row.replaced_by;
    }

    assert_eq!(seen.len(), 4);
    assert_eq!(active, 1);
}

// --- Logout ---

#[tokio::test]
async fn logout_then_refresh_returns_401() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;
    let (_, refresh) = login_user(&app, &client, "a@x.com", "SecurePass123").await;

    let response = client
        .post(format!("{}/auth/logout", &app.address))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, response.status().as_u16());

    let replay = client
        .post(format!("{}/auth/refresh", &app.address))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, replay.status().as_u16());
}

#[tokio::test]
async fn logout_without_token_succeeds() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    // No body at all.
    let bare = client
        .post(format!("{}/auth/logout", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, bare.status().as_u16());

    // Body without a token.
    let empty = client
        .post(format!("{}/auth/logout", &app.address))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, empty.status().as_u16());

    // Unverifiable token is already-logged-out, not an error.
    let garbage = client
        .post(format!("{}/auth/logout", &app.address))
        .json(&json!({ "refresh_token": "garbage" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(204, garbage.status().as_u16());
}

// --- Protected route ---

#[tokio::test]
async fn me_requires_a_valid_access_token() {
    let app = spawn_app();
    let client = reqwest::Client::new();

    register_user(&app, &client, "a@x.com", "SecurePass123").await;
    let (access, refresh) = login_user(&app, &client, "a@x.com", "SecurePass123").await;

    // No header
    let missing = client
        .get(format!("{}/auth/me", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, missing.status().as_u16());

    // Refresh token is not an access token.
    let wrong_kind = client
        .get(format!("{}/auth/me", &app.address))
        .bearer_auth(&refresh)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, wrong_kind.status().as_u16());

    let ok = client
        .get(format!("{}/auth/me", &app.address))
        .bearer_auth(&access)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, ok.status().as_u16());

    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["email"], "a@x.com");
    assert!(body.get("password_hash").is_none());
}
