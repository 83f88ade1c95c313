use std::future::Future;

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;

use crate::{
    error::{AppError, Result},
    models::session::NewSession,
};

/// Durable record of issued sessions.
pub trait SessionStore: Clone + Send + Sync + 'static {
    fn insert_session(&self, session: NewSession) -> impl Future<Output = Result<()>> + Send;

    /// Returns the owning account if a session with this token exists, was
    /// issued to `ip`, and has not expired at `now`.
    fn find_account_id(
        &self,
        token: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<i64>>> + Send;

    /// Pushes the expiration forward. Returns `false` if the token is unknown.
    fn extend_expiration(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Removes the session. Deleting an unknown token is not an error.
    fn delete_session(&self, token: &str) -> impl Future<Output = Result<()>> + Send;
}

/// `SessionStore` backed by the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: Pool,
}

impl PgSessionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl SessionStore for PgSessionStore {
    async fn insert_session(&self, session: NewSession) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO sessions (sid, user_id, expires_at, ip, user_agent)
                VALUES ($1, $2, $3, $4, $5)
                "#,
                &[
                    &session.token,
                    &session.account_id,
                    &session.expires_at,
                    &session.ip,
                    &session.user_agent,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find_account_id(&self, token: &str, ip: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT user_id
                FROM sessions
                WHERE sid = $1 AND ip = $2 AND expires_at > $3
                "#,
                &[&token, &ip, &now],
            )
            .await?;
        row.map(|r| {
            r.try_get("user_id")
                .map_err(|_| AppError::MissingData("user_id".to_string()))
        })
        .transpose()
    }

    async fn extend_expiration(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE sessions SET expires_at = $2 WHERE sid = $1",
                &[&token, &expires_at],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM sessions WHERE sid = $1", &[&token])
            .await?;
        Ok(())
    }
}
