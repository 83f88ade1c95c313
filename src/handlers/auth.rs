use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use zeroize::Zeroizing;

use crate::{
    config::Config,
    error::{AppError, Result},
    middleware_layer::auth::AuthenticatedUser,
    models::user::AccountProfile,
    net::client_ip,
    repositories::{cache::SessionCache, session::SessionStore, user::CredentialStore},
    services::{auth::ClientInfo, credentials::Registration},
    state::AppState,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// The request payload for user registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Builds the session cookie, valid for the configured session duration.
pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);

    cookie.set_http_only(true);
    if config.secure_cookies {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Strict);
    cookie.set_max_age(Duration::seconds(config.session_duration.as_secs() as i64));
    cookie.set_path("/");

    cookie
}

/// A cookie that, once removed, clears the session cookie on the client.
pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie
}

fn client_info(addr: SocketAddr, headers: &HeaderMap) -> ClientInfo {
    let remote = addr.to_string();
    ClientInfo {
        ip: client_ip(&remote).to_string(),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    }
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(body)| body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        AppError::Validation("Invalid request format".to_string())
    })
}

/// Handles user registration.
pub async fn register<U, S, C>(
    State(state): State<AppState<U, S, C>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    cookies: Cookies,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    let payload = json_body(payload)?;
    let client = client_info(addr, &headers);
    tracing::info!("📝 Register attempt from {} for {}", client.ip, payload.email.trim());

    let (account_id, session) = state
        .auth
        .register(
            Registration {
                first_name: payload.first_name,
                last_name: payload.last_name,
                email: payload.email,
                password: Zeroizing::new(payload.password),
            },
            &client,
        )
        .await?;

    cookies.add(session_cookie(session.token, &state.config));
    tracing::info!("✅ Account registered: {}", account_id);

    let response = AuthResponse {
        success: true,
        message: "Registration successful. Welcome!".to_string(),
        id: Some(account_id),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
pub async fn login<U, S, C>(
    State(state): State<AppState<U, S, C>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    cookies: Cookies,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    let payload = json_body(payload)?;
    let client = client_info(addr, &headers);
    tracing::info!("🔐 Login attempt from {}", client.ip);

    let (account_id, session) = state
        .auth
        .login(&payload.email, Zeroizing::new(payload.password), &client)
        .await?;

    cookies.add(session_cookie(session.token, &state.config));
    tracing::info!("✅ Account logged in: {}", account_id);

    let response = AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        id: Some(account_id),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the signed-in account.
pub async fn me<U, S, C>(
    State(state): State<AppState<U, S, C>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<AccountProfile>>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    match state.auth.current_account(user.account_id).await {
        Ok(profile) => Ok(Json(profile)),
        // Session outlived its account.
        Err(AppError::NotFound) => Err(AppError::Unauthorized),
        Err(e) => Err(e),
    }
}

/// Handles user logout.
pub async fn logout<U, S, C>(
    State(state): State<AppState<U, S, C>>,
    Extension(user): Extension<AuthenticatedUser>,
    cookies: Cookies,
) -> Result<Response>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    tracing::info!("👋 Logout for account: {}", user.account_id);

    cookies.remove(expired_session_cookie());
    state.auth.logout(&user.token).await?;

    tracing::info!("✅ Account logged out: {}", user.account_id);

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
        id: None,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
