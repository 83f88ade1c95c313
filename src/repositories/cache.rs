use std::future::Future;
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::Result;

/// Namespace for session cache keys.
const SESSION_KEY_PREFIX: &str = "gatehouse:sessions:";

/// Cache key for a session token.
///
/// Plain concatenation, not a hash: the token is already 256 random bits.
pub fn session_cache_key(token: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, token)
}

/// Ephemeral key/value cache with per-entry TTL. Advisory only: callers treat
/// every error as a miss.
pub trait SessionCache: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// `SessionCache` backed by Redis.
#[derive(Clone)]
pub struct RedisSessionCache {
    redis: ConnectionManager,
}

impl RedisSessionCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

impl SessionCache for RedisSessionCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut redis = self.redis.clone();
        let value: Option<String> = redis.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(key).await?;
        Ok(())
    }
}
