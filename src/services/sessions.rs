use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::task::TaskTracker;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::crypto::token::generate_session_token;
use crate::db::with_deadline;
use crate::error::{AppError, Result};
use crate::models::session::{CachedBinding, IssuedSession, NewSession, ValidatedSession};
use crate::repositories::{
    cache::{session_cache_key, SessionCache},
    session::SessionStore,
};

/// Lifetime of a cache entry, independent of the session duration.
pub const SESSION_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Timing knobs for the session manager.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub session_duration: Duration,
    pub cache_ttl: Duration,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_duration: config.session_duration,
            cache_ttl: SESSION_CACHE_TTL,
            store_timeout: config.store_timeout,
            cache_timeout: config.cache_timeout,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(168 * 3600),
            cache_ttl: SESSION_CACHE_TTL,
            store_timeout: Duration::from_secs(3),
            cache_timeout: Duration::from_millis(250),
        }
    }
}

/// Runs a cache call under the cache deadline. Errors and timeouts both come
/// back as `None`.
async fn advisory<T, F>(limit: Duration, op: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!("⚠️ Session cache {} failed, treating as miss: {}", op, e);
            None
        }
        Err(_) => {
            tracing::warn!("⚠️ Session cache {} timed out, treating as miss", op);
            None
        }
    }
}

/// Issues, validates, renews and destroys sessions.
///
/// Validation is cache-first. A cache hit is trusted as-is, including its IP
/// binding. A miss goes to the durable store, and a store hit renews the
/// session and refills the cache from a detached task.
#[derive(Clone)]
pub struct SessionManager<S, C> {
    store: S,
    cache: C,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    renewals: TaskTracker,
}

impl<S: SessionStore, C: SessionCache> SessionManager<S, C> {
    pub fn new(store: S, cache: C, settings: SessionSettings) -> Self {
        Self::with_clock(store, cache, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, cache: C, settings: SessionSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache,
            clock,
            settings,
            renewals: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn expires_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let duration = chrono::Duration::from_std(self.settings.session_duration)
            .map_err(|e| AppError::Internal(format!("Session duration out of range: {}", e)))?;
        now.checked_add_signed(duration)
            .ok_or_else(|| AppError::Internal("Session expiry out of range".to_string()))
    }

    /// Issues a new session for `account_id`, bound to `ip`.
    pub async fn create_session(&self, account_id: i64, ip: &str, user_agent: &str) -> Result<IssuedSession> {
        let token = generate_session_token()?;
        let expires_at = self.expires_from(self.clock.now())?;

        with_deadline(
            self.settings.store_timeout,
            "session store",
            self.store.insert_session(NewSession {
                token: token.clone(),
                account_id,
                expires_at,
                ip: ip.to_string(),
                user_agent: user_agent.to_string(),
            }),
        )
        .await?;

        let binding = CachedBinding { account_id, ip: ip.to_string() };
        advisory(
            self.settings.cache_timeout,
            "set",
            self.cache.set(&session_cache_key(&token), &binding.encode(), self.settings.cache_ttl),
        )
        .await;

        tracing::info!("✅ Session created for account {} from {}", account_id, ip);
        Ok(IssuedSession { token, expires_at })
    }

    /// Checks `token` presented from `ip`.
    ///
    /// # Returns
    ///
    /// `ValidatedSession` on success. Fails with `IpMismatch` when the cached
    /// binding names another address, `NotFound` when the store has no live
    /// session for the token and address, and a store error when the store
    /// cannot be reached.
    pub async fn validate_session(&self, ip: &str, token: &str) -> Result<ValidatedSession> {
        let key = session_cache_key(token);

        let cached = advisory(self.settings.cache_timeout, "get", self.cache.get(&key))
            .await
            .flatten();

        if let Some(raw) = cached {
            match CachedBinding::decode(&raw) {
                Some(binding) if binding.ip != ip => {
                    tracing::warn!(
                        "❌ Session for account {} presented from {} but bound to {}",
                        binding.account_id, ip, binding.ip
                    );
                    return Err(AppError::IpMismatch);
                }
                Some(binding) => {
                    tracing::debug!("✅ Session cache hit for account {}", binding.account_id);
                    return Ok(ValidatedSession { renewed: false, account_id: binding.account_id });
                }
                None => tracing::warn!("⚠️ Undecodable session cache entry, falling back to store"),
            }
        }

        let now = self.clock.now();
        let account_id = with_deadline(
            self.settings.store_timeout,
            "session store",
            self.store.find_account_id(token, ip, now),
        )
        .await?
        .ok_or(AppError::NotFound)?;

        self.spawn_renewal(token.to_string(), CachedBinding { account_id, ip: ip.to_string() }, now)?;

        tracing::debug!("✅ Session validated against store for account {}", account_id);
        Ok(ValidatedSession { renewed: true, account_id })
    }

    /// Extends the expiration and refills the cache without blocking the
    /// caller. Failures are logged.
    ///
    /// The cache is only refilled while the session row exists. A logout that
    /// lands between the refill and the re-check is caught by the re-check,
    /// which evicts the key again.
    fn spawn_renewal(&self, token: String, binding: CachedBinding, now: DateTime<Utc>) -> Result<()> {
        let expires_at = self.expires_from(now)?;
        let store = self.store.clone();
        let cache = self.cache.clone();
        let settings = self.settings;

        self.renewals.spawn(async move {
            let key = session_cache_key(&token);

            let extended = with_deadline(
                settings.store_timeout,
                "session store",
                store.extend_expiration(&token, expires_at),
            )
            .await;

            match extended {
                Ok(true) => tracing::debug!("🔄 Session for account {} renewed", binding.account_id),
                Ok(false) => {
                    tracing::debug!("🔄 Session for account {} is gone, not refilling cache", binding.account_id);
                    advisory(settings.cache_timeout, "evict", cache.delete(&key)).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Failed to renew session for account {}: {}",
                        binding.account_id, e
                    );
                    return;
                }
            }

            advisory(
                settings.cache_timeout,
                "refill",
                cache.set(&key, &binding.encode(), settings.cache_ttl),
            )
            .await;

            let still_live = with_deadline(
                settings.store_timeout,
                "session store",
                store.find_account_id(&token, &binding.ip, now),
            )
            .await;
            if !matches!(still_live, Ok(Some(_))) {
                tracing::debug!("🔄 Session for account {} ended during renewal, evicting", binding.account_id);
                advisory(settings.cache_timeout, "evict", cache.delete(&key)).await;
            }
        });

        Ok(())
    }

    /// Deletes the session and evicts its cache entry. Unknown tokens are fine.
    pub async fn destroy_session(&self, token: &str) -> Result<()> {
        with_deadline(
            self.settings.store_timeout,
            "session store",
            self.store.delete_session(token),
        )
        .await?;

        advisory(
            self.settings.cache_timeout,
            "delete",
            self.cache.delete(&session_cache_key(token)),
        )
        .await;

        tracing::info!("✅ Session destroyed");
        Ok(())
    }

    /// Waits for every renewal spawned so far.
    pub async fn drain_renewals(&self) {
        self.renewals.close();
        self.renewals.wait().await;
        self.renewals.reopen();
    }
}
