//! In-process store and cache doubles for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::{
    session::NewSession,
    user::{Account, NewAccount},
};
use crate::repositories::{cache::SessionCache, session::SessionStore, user::CredentialStore};

#[derive(Default)]
struct Accounts {
    next_id: i64,
    rows: Vec<Account>,
}

/// Accounts in a vector, with a unique-email check on insert.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<Mutex<Accounts>>,
    /// When set, `exists_by_email` always answers `false`, as if a concurrent
    /// registration had not committed yet.
    pub skip_precheck: Arc<AtomicBool>,
}

impl MemoryCredentialStore {
    pub async fn stored_email(&self, id: i64) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.rows.iter().find(|a| a.id == id).map(|a| a.email.clone())
    }

    pub async fn stored_hash(&self, id: i64) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.rows.iter().find(|a| a.id == id).map(|a| a.password_hash.clone())
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn insert_account(&self, account: NewAccount) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        if inner.rows.iter().any(|a| a.email.eq_ignore_ascii_case(&account.email)) {
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.push(Account {
            id,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            password_hash: account.password_hash,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|a| a.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().find(|a| a.id == id).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        if self.skip_precheck.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let inner = self.inner.lock().await;
        Ok(inner.rows.iter().any(|a| a.email.eq_ignore_ascii_case(email)))
    }
}

/// Sessions keyed by token.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    rows: Arc<Mutex<HashMap<String, NewSession>>>,
    /// Number of `find_account_id` calls, to tell cache hits from store hits.
    pub lookups: Arc<AtomicUsize>,
    /// When set, every call fails as if the database were down.
    pub fail: Arc<AtomicBool>,
}

impl MemorySessionStore {
    pub async fn get(&self, token: &str) -> Option<NewSession> {
        self.rows.lock().await.get(token).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("session store unavailable".to_string()));
        }
        Ok(())
    }
}

impl SessionStore for MemorySessionStore {
    async fn insert_session(&self, session: NewSession) -> Result<()> {
        self.check()?;
        self.rows.lock().await.insert(session.token.clone(), session);
        Ok(())
    }

    async fn find_account_id(&self, token: &str, ip: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
        self.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().await;
        Ok(rows
            .get(token)
            .filter(|s| s.ip == ip && s.expires_at > now)
            .map(|s| s.account_id))
    }

    async fn extend_expiration(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        match self.rows.lock().await.get_mut(token) {
            Some(session) => {
                session.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        self.check()?;
        self.rows.lock().await.remove(token);
        Ok(())
    }
}

/// TTL cache driven by an injected clock.
#[derive(Clone)]
pub struct MemorySessionCache {
    entries: Arc<Mutex<HashMap<String, (String, DateTime<Utc>)>>>,
    clock: Arc<dyn Clock>,
    /// When set, every call returns an error.
    pub fail: Arc<AtomicBool>,
    /// When set, every call sleeps for a second first.
    pub stall: Arc<AtomicBool>,
}

impl MemorySessionCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::default(),
            clock,
            fail: Arc::default(),
            stall: Arc::default(),
        }
    }

    /// Raw view of an entry, ignoring TTL.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).map(|(v, _)| v.clone())
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        let expires = self.clock.now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        self.entries.lock().await.insert(key.to_string(), (value.to_string(), expires));
    }

    async fn gate(&self) -> Result<()> {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache unavailable".to_string()));
        }
        Ok(())
    }
}

impl SessionCache for MemorySessionCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gate().await?;
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.gate().await?;
        self.insert_raw(key, value, ttl).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.gate().await?;
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
