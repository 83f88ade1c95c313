use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    handlers::auth::{expired_session_cookie, session_cookie, SESSION_COOKIE},
    net::client_ip,
    repositories::{cache::SessionCache, session::SessionStore, user::CredentialStore},
    state::AppState,
};

/// The identity established by `require_auth`, handed to downstream handlers
/// as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub account_id: i64,
    /// The session token the request was authenticated with.
    pub token: String,
}

/// Extracts the session token from the request cookies.
fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// A middleware that requires a valid session to be present.
///
/// Reissues the session cookie when the session was renewed, and clears it
/// when the session is rejected.
pub async fn require_auth<U, S, C>(
    State(state): State<AppState<U, S, C>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    tracing::debug!("🔐 Checking authentication...");

    let token = extract_session_token(&cookies).ok_or_else(|| {
        tracing::debug!("❌ No session cookie found");
        AppError::Unauthorized
    })?;

    let remote = addr.to_string();
    let ip = client_ip(&remote);

    let validated = match state.auth.validate(ip, &token).await {
        Ok(validated) => validated,
        Err(e) if e.is_auth_failure() => {
            tracing::warn!("❌ Invalid session from {}: {}", ip, e);
            cookies.remove(expired_session_cookie());
            return Err(AppError::Unauthorized);
        }
        Err(e) => return Err(e),
    };

    if validated.renewed {
        cookies.add(session_cookie(token.clone(), &state.config));
        tracing::debug!("🔄 Session cookie reissued for account {}", validated.account_id);
    }

    tracing::debug!("✅ Account authenticated: {}", validated.account_id);

    request.extensions_mut().insert(AuthenticatedUser {
        account_id: validated.account_id,
        token,
    });

    Ok(next.run(request).await)
}
