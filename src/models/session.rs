use chrono::{DateTime, Utc};

/// A session row as written to the durable store.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// The opaque session token.
    pub token: String,
    /// The ID of the account this session belongs to.
    pub account_id: i64,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
    /// The address the session was issued to.
    pub ip: String,
    /// The user agent that requested the session.
    pub user_agent: String,
}

/// The token handed back to the client after login or registration.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSession {
    /// True when the session was confirmed against the durable store and its
    /// expiration pushed forward. The client cookie should be reissued.
    pub renewed: bool,
    /// The owning account.
    pub account_id: i64,
}

/// The value kept in the session cache: `<account_id>|<ip>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBinding {
    pub account_id: i64,
    pub ip: String,
}

impl CachedBinding {
    /// Packs the binding into its cache representation.
    pub fn encode(&self) -> String {
        format!("{}|{}", self.account_id, self.ip)
    }

    /// Unpacks a cache value. Returns `None` for anything malformed.
    pub fn decode(raw: &str) -> Option<Self> {
        let (id, ip) = raw.split_once('|')?;
        if ip.is_empty() || ip.contains('|') {
            return None;
        }
        Some(Self {
            account_id: id.parse().ok()?,
            ip: ip.to_string(),
        })
    }
}
