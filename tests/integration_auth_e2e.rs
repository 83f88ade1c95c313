//! End-to-end run against a live server with PostgreSQL and Redis behind it.
//!
//! Start the server, then: `cargo test -- --ignored`
//! (`GATEHOUSE_URL` overrides the default `http://127.0.0.1:8080`).

use std::time::{SystemTime, UNIX_EPOCH};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("GATEHOUSE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
});

// Shared test context
struct TestContext {
    client: reqwest::Client,
}

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .unwrap(),
        }
    }

    fn url(path: &str) -> String {
        format!("{}{}", BASE_URL.as_str(), path)
    }

    fn unique_email() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("ann_{}@example.com", nanos)
    }
}

#[tokio::test]
#[ignore = "needs a running server"]
async fn test_register_login_me_logout() {
    let context = TestContext::new();
    let email = TestContext::unique_email();

    // Step 1: Registration signs the client in
    let reg_response = context.client.post(TestContext::url("/api/users/register"))
        .json(&json!({
            "first_name": "Ann",
            "last_name": "Lee",
            "email": format!("  {}", email.to_uppercase()),
            "password": "Str0ng!Pass2024"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(reg_response.status().as_u16(), 201, "Registration failed");
    let reg_body: Value = reg_response.json().await.unwrap();
    let account_id = reg_body["id"].as_i64().unwrap();

    // Step 2: Session cookie works
    let me: Value = context.client.get(TestContext::url("/api/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], account_id);
    assert_eq!(me["email"], email);

    // Step 3: Same email again is a conflict
    let dup = context.client.post(TestContext::url("/api/users/register"))
        .json(&json!({
            "first_name": "Ann",
            "last_name": "Lee",
            "email": email,
            "password": "Str0ng!Pass2024"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status().as_u16(), 409);

    // Step 4: Wrong password
    let bad = context.client.post(TestContext::url("/api/users/login"))
        .json(&json!({ "email": email, "password": "nope-Nope-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 401);

    // Step 5: Logout, then the session is gone
    let logout = context.client.post(TestContext::url("/api/me/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status().as_u16(), 200);

    let after = context.client.get(TestContext::url("/api/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(after.status().as_u16(), 401);

    // Step 6: Login opens a fresh session
    let login = context.client.post(TestContext::url("/api/users/login"))
        .json(&json!({ "email": email, "password": "Str0ng!Pass2024" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status().as_u16(), 200, "Login failed");
    let login_body: Value = login.json().await.unwrap();
    assert_eq!(login_body["id"], account_id);
}

#[tokio::test]
#[ignore = "needs a running server"]
async fn test_weak_password_is_rejected() {
    let context = TestContext::new();

    let response = context.client.post(TestContext::url("/api/users/register"))
        .json(&json!({
            "first_name": "Ann",
            "last_name": "Lee",
            "email": TestContext::unique_email(),
            "password": "password"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}
