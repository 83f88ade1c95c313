use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::db::with_deadline;
use crate::error::{AppError, Result};
use crate::models::user::{Account, NewAccount};
use crate::repositories::user::CredentialStore;
use crate::validation::auth::{canonical_email, normalize_email, normalize_name, validate_password};

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 1;
/// Verified against when the email is unknown, so both login failures cost
/// one Argon2 verification.
const DUMMY_PASSWORD: &str = "gatehouse-dummy-password";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    /// Roughly 100ms per verification on commodity hardware.
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_MEMORY_MB * 1024,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

/// The fields submitted at registration, before any normalization.
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
/// * `cost` - The Argon2 cost parameters.
///
/// # Returns
///
/// A `Result` containing the PHC-formatted hash.
fn hash_password(password: &str, cost: HashCost) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Hashing(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(cost.memory_kib)
            .t_cost(cost.iterations)
            .p_cost(cost.parallelism)
            .build()
            .map_err(|e| AppError::Hashing(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Hashing(format!("Argon2 hash error: {}", e)))?
        .to_string();

    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash. The cost parameters come from the
/// PHC string itself.
///
/// # Returns
///
/// A `Result` containing `true` if the password matches.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Hashing(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();

    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Runs a CPU-bound closure on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Creates accounts and checks passwords.
#[derive(Clone)]
pub struct CredentialManager<S> {
    store: S,
    store_timeout: Duration,
    cost: HashCost,
    dummy_hash: Arc<OnceCell<String>>,
}

impl<S: CredentialStore> CredentialManager<S> {
    pub fn new(store: S, store_timeout: Duration) -> Self {
        Self::with_cost(store, store_timeout, HashCost::default())
    }

    pub fn with_cost(store: S, store_timeout: Duration, cost: HashCost) -> Self {
        Self {
            store,
            store_timeout,
            cost,
            dummy_hash: Arc::default(),
        }
    }

    /// A hash at the configured cost, computed on first use.
    async fn unknown_account_hash(&self) -> Result<String> {
        let cost = self.cost;
        self.dummy_hash
            .get_or_try_init(|| blocking(move || hash_password(DUMMY_PASSWORD, cost)))
            .await
            .cloned()
    }

    /// Validates and persists a new account.
    ///
    /// # Returns
    ///
    /// A `Result` containing the new account id. Fails with `Validation` for
    /// bad input and `Conflict` when the email is taken.
    pub async fn create_account(&self, input: Registration) -> Result<i64> {
        let email = normalize_email(&input.email)?;
        let first_name = normalize_name(&input.first_name)?;
        let last_name = normalize_name(&input.last_name)?;
        validate_password(&input.password)?;

        tracing::debug!("🔐 Creating account: {}", email);

        let exists = with_deadline(
            self.store_timeout,
            "credential store",
            self.store.exists_by_email(&email),
        )
        .await?;
        if exists {
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }

        let password = input.password;
        let cost = self.cost;
        let password_hash = blocking(move || hash_password(&password, cost)).await?;

        // The pre-check can race with a concurrent registration; the unique
        // index turns the loser into a Conflict here.
        let id = with_deadline(
            self.store_timeout,
            "credential store",
            self.store.insert_account(NewAccount {
                first_name,
                last_name,
                email: email.clone(),
                password_hash,
            }),
        )
        .await
        .inspect_err(|e| {
            if !matches!(e, AppError::Conflict(_)) {
                tracing::error!("❌ Unable to create account for {}: {}", email, e);
            }
        })?;

        tracing::info!("✅ Account {} created for {}", id, email);
        Ok(id)
    }

    /// Checks an email/password pair.
    ///
    /// # Returns
    ///
    /// A `Result` containing the account id. Unknown email and wrong password
    /// both fail with `InvalidCredentials`.
    pub async fn authenticate(&self, email: &str, password: Zeroizing<String>) -> Result<i64> {
        if email.trim().is_empty() || password.trim().is_empty() {
            return Err(AppError::Validation("Email and password are required".to_string()));
        }

        let email = canonical_email(email);
        tracing::debug!("🔐 Authenticating: {}", email);

        let account = with_deadline(
            self.store_timeout,
            "credential store",
            self.store.find_by_email(&email),
        )
        .await?;

        let Some(account) = account else {
            let dummy = self.unknown_account_hash().await?;
            blocking(move || verify_password(&password, &dummy)).await?;
            tracing::warn!("❌ Login for unknown email: {}", email);
            return Err(AppError::InvalidCredentials);
        };

        let hash = account.password_hash;
        if !blocking(move || verify_password(&password, &hash)).await? {
            tracing::warn!("❌ Wrong password for account: {}", account.id);
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!("✅ Account authenticated: {}", account.id);
        Ok(account.id)
    }

    /// Loads an account by id.
    pub async fn find_account(&self, id: i64) -> Result<Account> {
        with_deadline(self.store_timeout, "credential store", self.store.find_by_id(id))
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
pub(crate) fn test_cost() -> HashCost {
    HashCost { memory_kib: 64, iterations: 1, parallelism: 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryCredentialStore;
    use std::sync::atomic::Ordering;

    fn manager(store: MemoryCredentialStore) -> CredentialManager<MemoryCredentialStore> {
        CredentialManager::with_cost(store, Duration::from_secs(1), test_cost())
    }

    fn ann() -> Registration {
        Registration {
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: "Ann@Example.com ".into(),
            password: Zeroizing::new("Str0ng!Pass2024".into()),
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_hashes_password() {
        let store = MemoryCredentialStore::default();
        let credentials = manager(store.clone());

        let id = credentials.create_account(ann()).await.unwrap();

        assert_eq!(store.stored_email(id).await.as_deref(), Some("ann@example.com"));
        let hash = store.stored_hash(id).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("Str0ng!Pass2024"));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let credentials = manager(MemoryCredentialStore::default());
        credentials.create_account(ann()).await.unwrap();

        let mut again = ann();
        again.email = "ANN@example.COM".into();
        let err = credentials.create_account(again).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn store_constraint_backs_up_the_precheck() {
        let store = MemoryCredentialStore::default();
        let credentials = manager(store.clone());
        credentials.create_account(ann()).await.unwrap();

        store.skip_precheck.store(true, Ordering::SeqCst);
        let err = credentials.create_account(ann()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_registrations_are_rejected() {
        let credentials = manager(MemoryCredentialStore::default());

        let mut weak = ann();
        weak.password = Zeroizing::new("password".into());
        assert!(matches!(credentials.create_account(weak).await, Err(AppError::Validation(_))));

        let mut nameless = ann();
        nameless.last_name = "   ".into();
        assert!(matches!(credentials.create_account(nameless).await, Err(AppError::Validation(_))));

        let mut bad_email = ann();
        bad_email.email = "ann-at-example".into();
        assert!(matches!(credentials.create_account(bad_email).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn authenticate_round_trip() {
        let credentials = manager(MemoryCredentialStore::default());
        let id = credentials.create_account(ann()).await.unwrap();

        let logged_in = credentials
            .authenticate("ann@example.com", Zeroizing::new("Str0ng!Pass2024".into()))
            .await
            .unwrap();
        assert_eq!(logged_in, id);

        let padded = credentials
            .authenticate("  Ann@Example.com", Zeroizing::new("Str0ng!Pass2024".into()))
            .await
            .unwrap();
        assert_eq!(padded, id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let credentials = manager(MemoryCredentialStore::default());
        credentials.create_account(ann()).await.unwrap();

        let wrong = credentials
            .authenticate("ann@example.com", Zeroizing::new("Wr0ng!Pass2024".into()))
            .await
            .unwrap_err();
        let unknown = credentials
            .authenticate("bob@example.com", Zeroizing::new("Str0ng!Pass2024".into()))
            .await
            .unwrap_err();

        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_verification() {
        let credentials = manager(MemoryCredentialStore::default());
        assert!(credentials.dummy_hash.get().is_none());

        let err = credentials
            .authenticate("nobody@example.com", Zeroizing::new("Str0ng!Pass2024".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidCredentials));
        let dummy = credentials.dummy_hash.get().unwrap();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(dummy.contains("m=64,t=1,p=1"));
    }

    #[tokio::test]
    async fn blank_login_fields_are_a_validation_error() {
        let credentials = manager(MemoryCredentialStore::default());
        let err = credentials
            .authenticate(" ", Zeroizing::new("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn find_account_reports_not_found() {
        let credentials = manager(MemoryCredentialStore::default());
        assert!(matches!(credentials.find_account(99).await, Err(AppError::NotFound)));
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Str0ng!Pass2024", test_cost()).unwrap();
        assert!(verify_password("Str0ng!Pass2024", &hash).unwrap());
        assert!(!verify_password("Str0ng!Pass2025", &hash).unwrap());
    }
}
