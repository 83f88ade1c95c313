use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers, middleware_layer,
    repositories::{cache::SessionCache, session::SessionStore, user::CredentialStore},
    state::AppState,
};

/// Largest accepted request body. Registration and login payloads are tiny.
const MAX_BODY_BYTES: usize = 1024;

async fn healthz() -> &'static str {
    "."
}

fn cors(public_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300));

    match public_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!("⚠️ PUBLIC_URL is not a valid origin ({}), CORS disabled", e);
            layer
        }
    }
}

/// Builds the application router.
pub fn router<U, S, C>(state: AppState<U, S, C>) -> Router
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    let public_routes = Router::new()
        .route("/api/users/register", post(handlers::auth::register::<U, S, C>))
        .route("/api/users/login", post(handlers::auth::login::<U, S, C>))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/me", get(handlers::auth::me::<U, S, C>))
        .route("/api/me/logout", post(handlers::auth::logout::<U, S, C>))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth::<U, S, C>,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::default())
                        .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                        .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
                )
                .layer(cors(&state.config.public_url))
                .layer(CookieManagerLayer::new())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::Config;
    use crate::handlers::auth::SESSION_COOKIE;
    use crate::repositories::memory::{MemoryCredentialStore, MemorySessionCache, MemorySessionStore};
    use crate::services::{
        auth::{AuthService, ClientInfo},
        credentials::{test_cost, CredentialManager, Registration},
        sessions::{SessionManager, SessionSettings},
    };
    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{Request, StatusCode},
        response::Response,
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;
    use zeroize::Zeroizing;

    type TestState = AppState<MemoryCredentialStore, MemorySessionStore, MemorySessionCache>;

    struct TestApp {
        state: TestState,
        cache: MemorySessionCache,
        app: Router,
    }

    fn test_app() -> TestApp {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/auth".to_string()),
            _ => None,
        })
        .unwrap();
        let cache = MemorySessionCache::new(Arc::new(SystemClock));
        let credentials = CredentialManager::with_cost(
            MemoryCredentialStore::default(),
            Duration::from_secs(1),
            test_cost(),
        );
        let sessions = SessionManager::new(MemorySessionStore::default(), cache.clone(), SessionSettings::default());
        let state = AppState::new(config, AuthService::new(credentials, sessions));
        let app = router(state.clone());
        TestApp { state, cache, app }
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token));
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))));
        request
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn signed_in(app: &TestApp) -> (i64, String) {
        let (id, session) = app
            .state
            .auth
            .register(
                Registration {
                    first_name: "Ann".into(),
                    last_name: "Lee".into(),
                    email: "ann@example.com".into(),
                    password: Zeroizing::new("Str0ng!Pass2024".into()),
                },
                &ClientInfo { ip: "10.0.0.1".into(), user_agent: "test".into() },
            )
            .await
            .unwrap();
        (id, session.token)
    }

    #[tokio::test]
    async fn me_without_cookie_is_unauthorized() {
        let app = test_app();

        let response = app.app.clone().oneshot(request(Method::GET, "/api/me", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(json(response).await["error"], "unauthorized");
    }

    #[tokio::test]
    async fn rejected_session_clears_the_cookie() {
        let app = test_app();

        let response = app
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/me", Some("not-a-session")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with(&format!("{}=;", SESSION_COOKIE)));
        assert!(cookies[0].contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn cached_session_reaches_me_without_reissuing() {
        let app = test_app();
        let (id, token) = signed_in(&app).await;

        let response = app
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/me", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
        let body = json(response).await;
        assert_eq!(body["id"], id);
        assert_eq!(body["email"], "ann@example.com");
    }

    #[tokio::test]
    async fn renewed_session_reissues_the_cookie() {
        let app = test_app();
        let (_, token) = signed_in(&app).await;
        app.cache.clear().await;

        let response = app
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/me", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with(&format!("{}={}", SESSION_COOKIE, token)));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[0].contains("Max-Age=604800"));
    }

    #[tokio::test]
    async fn session_for_a_vanished_account_is_unauthorized() {
        let app = test_app();
        let orphan = app
            .state
            .auth
            .sessions()
            .create_session(99, "10.0.0.1", "test")
            .await
            .unwrap();

        let response = app
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/me", Some(&orphan.token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_on_a_cold_cache_ends_the_session() {
        let app = test_app();
        let (_, token) = signed_in(&app).await;
        app.cache.clear().await;

        let response = app
            .app
            .clone()
            .oneshot(request(Method::POST, "/api/me/logout", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["message"], "Logout successful");

        app.state.auth.sessions().drain_renewals().await;

        let after = app
            .app
            .clone()
            .oneshot(request(Method::GET, "/api/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn healthz_answers() {
        let app = test_app();
        let response = app.app.clone().oneshot(request(Method::GET, "/healthz", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
