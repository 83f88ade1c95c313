use zeroize::Zeroizing;

use crate::error::Result;
use crate::models::session::{IssuedSession, ValidatedSession};
use crate::models::user::AccountProfile;
use crate::repositories::{cache::SessionCache, session::SessionStore, user::CredentialStore};
use crate::services::credentials::{CredentialManager, Registration};
use crate::services::sessions::SessionManager;

/// Where a request came from, as far as session binding is concerned.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

/// The caller-facing entry points: register, login, validate, logout.
#[derive(Clone)]
pub struct AuthService<U, S, C> {
    credentials: CredentialManager<U>,
    sessions: SessionManager<S, C>,
}

impl<U, S, C> AuthService<U, S, C>
where
    U: CredentialStore,
    S: SessionStore,
    C: SessionCache,
{
    pub fn new(credentials: CredentialManager<U>, sessions: SessionManager<S, C>) -> Self {
        Self { credentials, sessions }
    }

    pub fn sessions(&self) -> &SessionManager<S, C> {
        &self.sessions
    }

    /// Creates the account and signs it in.
    pub async fn register(&self, input: Registration, client: &ClientInfo) -> Result<(i64, IssuedSession)> {
        let account_id = self.credentials.create_account(input).await?;
        let session = self
            .sessions
            .create_session(account_id, &client.ip, &client.user_agent)
            .await
            .inspect_err(|e| tracing::error!("❌ Unable to create session for new account {}: {}", account_id, e))?;
        Ok((account_id, session))
    }

    /// Checks credentials and opens a new session.
    pub async fn login(
        &self,
        email: &str,
        password: Zeroizing<String>,
        client: &ClientInfo,
    ) -> Result<(i64, IssuedSession)> {
        let account_id = self.credentials.authenticate(email, password).await?;
        let session = self
            .sessions
            .create_session(account_id, &client.ip, &client.user_agent)
            .await?;
        Ok((account_id, session))
    }

    pub async fn validate(&self, ip: &str, token: &str) -> Result<ValidatedSession> {
        self.sessions.validate_session(ip, token).await
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.destroy_session(token).await
    }

    pub async fn current_account(&self, account_id: i64) -> Result<AccountProfile> {
        Ok(self.credentials.find_account(account_id).await?.into())
    }
}
