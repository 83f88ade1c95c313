use chrono::{DateTime, Utc};
use serde::Serialize;

/// Represents a registered account.
#[derive(Clone, Debug)]
pub struct Account {
    /// The unique identifier for the account.
    pub id: i64,
    /// The account holder's first name.
    pub first_name: String,
    /// The account holder's last name.
    pub last_name: String,
    /// The normalized email address.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// The timestamp when the account was created.
    pub created_at: DateTime<Utc>,
}

/// An account ready to be persisted. Email is already normalized and the
/// password already hashed.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// The public view of an account.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AccountProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            created_at: account.created_at,
        }
    }
}
