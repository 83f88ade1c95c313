use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};

/// Longest accepted session, ten years.
const MAX_SESSION_SECS: u64 = 10 * 365 * 24 * 3600;

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub addr: SocketAddr,
    /// The public origin of the frontend, allowed by CORS.
    pub public_url: String,
    /// How long a session lives after its last durable validation.
    pub session_duration: Duration,
    /// Upper bound for a single durable store call.
    pub store_timeout: Duration,
    /// Upper bound for a single cache call.
    pub cache_timeout: Duration,
    /// Maximum size of the PostgreSQL pool.
    pub db_max_connections: usize,
    /// Whether cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a `Config` from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let session_hours: u64 = get_or("SESSION_DURATION_HOURS", "168")
            .parse()
            .context("Invalid SESSION_DURATION_HOURS")?;
        if session_hours == 0 {
            anyhow::bail!("SESSION_DURATION_HOURS must be greater than zero");
        }
        let session_secs = session_hours
            .checked_mul(3600)
            .filter(|secs| *secs <= MAX_SESSION_SECS)
            .context("SESSION_DURATION_HOURS is too large")?;

        let store_timeout_ms: u64 = get_or("STORE_TIMEOUT_MS", "3000")
            .parse()
            .context("Invalid STORE_TIMEOUT_MS")?;
        let cache_timeout_ms: u64 = get_or("CACHE_TIMEOUT_MS", "250")
            .parse()
            .context("Invalid CACHE_TIMEOUT_MS")?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: get_or("REDIS_URL", "redis://127.0.0.1:6379/0"),
            addr: get_or("ADDR", "127.0.0.1:8080")
                .parse()
                .context("ADDR must be a socket address like 127.0.0.1:8080")?,
            public_url: get_or("PUBLIC_URL", "http://localhost:3000"),
            session_duration: Duration::from_secs(session_secs),
            store_timeout: Duration::from_millis(store_timeout_ms),
            cache_timeout: Duration::from_millis(cache_timeout_ms),
            db_max_connections: get_or("DB_MAX_CONNECTIONS", "32")
                .parse()
                .context("Invalid DB_MAX_CONNECTIONS")?,
            secure_cookies: get_or("APP_ENV", "development") == "production",
        })
    }
}
