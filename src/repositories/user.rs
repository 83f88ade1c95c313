use std::future::Future;

use deadpool_postgres::Pool;
use tokio_postgres::{Row, error::SqlState};

use crate::{
    error::{AppError, Result},
    models::user::{Account, NewAccount},
};

/// Durable record of accounts.
pub trait CredentialStore: Clone + Send + Sync + 'static {
    /// Persists an account and returns its id. Fails with `Conflict` when the
    /// email is already taken.
    fn insert_account(&self, account: NewAccount) -> impl Future<Output = Result<i64>> + Send;

    /// Looks an account up by normalized email.
    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Looks an account up by id.
    fn find_by_id(&self, id: i64) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Whether an account with this normalized email exists.
    fn exists_by_email(&self, email: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// A helper function to map a `tokio_postgres::Row` to an `Account`.
fn row_to_account(row: &Row) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        first_name: row.try_get("first_name").map_err(|_| AppError::MissingData("first_name".to_string()))?,
        last_name: row.try_get("last_name").map_err(|_| AppError::MissingData("last_name".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        password_hash: row.try_get("password").map_err(|_| AppError::MissingData("password".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

/// `CredentialStore` backed by the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: Pool,
}

impl PgCredentialStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl CredentialStore for PgCredentialStore {
    async fn insert_account(&self, account: NewAccount) -> Result<i64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO users (first_name, last_name, email, password)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
                &[
                    &account.first_name,
                    &account.last_name,
                    &account.email,
                    &account.password_hash,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::Conflict("User with this email already exists".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;
        row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, first_name, last_name, email, password, created_at
                FROM users
                WHERE LOWER(email) = LOWER($1)
                "#,
                &[&email],
            )
            .await?;
        row.map(|r| row_to_account(&r)).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, first_name, last_name, email, password, created_at
                FROM users
                WHERE id = $1
                "#,
                &[&id],
            )
            .await?;
        row.map(|r| row_to_account(&r)).transpose()
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)) AS found",
                &[&email],
            )
            .await?;
        row.try_get("found").map_err(|_| AppError::MissingData("found".to_string()))
    }
}
