use deadpool_postgres::Pool;
use redis::aio::ConnectionManager;
use crate::config::Config;
use crate::error::Result;
use crate::repositories::{
    cache::{RedisSessionCache, SessionCache},
    session::{PgSessionStore, SessionStore},
    user::{CredentialStore, PgCredentialStore},
};
use crate::services::{
    auth::AuthService,
    credentials::CredentialManager,
    sessions::{SessionManager, SessionSettings},
};

/// The application's state, generic over where accounts, sessions and the
/// session cache live. The defaults are the production wiring: PostgreSQL for
/// accounts and sessions, Redis for the session cache.
#[derive(Clone)]
pub struct AppState<U = PgCredentialStore, S = PgSessionStore, C = RedisSessionCache> {
    /// The application's configuration.
    pub config: Config,
    /// Registration, login and session handling.
    pub auth: AuthService<U, S, C>,
}

impl<U, S, C> AppState<U, S, C>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    pub fn new(config: Config, auth: AuthService<U, S, C>) -> Self {
        Self { config, auth }
    }
}

impl AppState {
    /// Connects to Redis and wires the managers over the given pool.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    /// * `db` - The PostgreSQL pool for accounts and sessions.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn connect(config: &Config, db: Pool) -> Result<Self> {
        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized");

        let credentials = CredentialManager::new(PgCredentialStore::new(db.clone()), config.store_timeout);
        let sessions = SessionManager::new(
            PgSessionStore::new(db),
            RedisSessionCache::new(redis),
            SessionSettings::from_config(config),
        );
        tracing::info!(
            "✅ Session manager initialized (duration {}h, cache TTL {}s)",
            config.session_duration.as_secs() / 3600,
            sessions.settings().cache_ttl.as_secs()
        );

        Ok(AppState::new(config.clone(), AuthService::new(credentials, sessions)))
    }
}
