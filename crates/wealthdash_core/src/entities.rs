use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a broker account (the broker's client id).
///
/// Surrounding whitespace is dropped both in `new` and when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        Self(id.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self::new(&id)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record of the accounts file.
///
/// `request_token` is the one-time login token, `access_token` the cached
/// session token written back after each fresh login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredential {
    pub account_id: AccountId,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_api_key: String,
    #[serde(default)]
    pub request_token: String,
    #[serde(default)]
    pub access_token: String,
}

impl AccountCredential {
    pub fn new(account_id: &str, api_key: &str, secret_api_key: &str) -> Self {
        Self {
            account_id: AccountId::new(account_id),
            api_key: api_key.to_string(),
            secret_api_key: secret_api_key.to_string(),
            request_token: String::new(),
            access_token: String::new(),
        }
    }

    pub fn with_request_token(mut self, token: &str) -> Self {
        self.request_token = token.to_string();
        self
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = token.to_string();
        self
    }

    /// Both API key and secret are present
    pub fn has_api_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.secret_api_key.trim().is_empty()
    }

    pub fn cached_session_token(&self) -> Option<&str> {
        non_blank(&self.access_token)
    }

    pub fn stored_login_token(&self) -> Option<&str> {
        non_blank(&self.request_token)
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Broker user profile, fetched to prove a session token works
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub broker: Option<String>,
}

/// Result of exchanging a request token
#[derive(Debug, Clone, Default)]
pub struct SessionGrant {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
}

/// A verified, live broker session for one account.
///
/// Only produced by a successful authentication that fetched the account
/// profile with the token. Never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionHandle {
    account_id: AccountId,
    api_key: String,
    access_token: String,
    profile: Profile,
    established_at: DateTime<Utc>,
}

impl SessionHandle {
    pub(crate) fn verified(
        account_id: AccountId,
        api_key: &str,
        access_token: &str,
        profile: Profile,
    ) -> Self {
        Self {
            account_id,
            api_key: api_key.to_string(),
            access_token: access_token.to_string(),
            profile,
            established_at: Utc::now(),
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(account_id: &str, api_key: &str, access_token: &str) -> Self {
        Self::verified(
            AccountId::new(account_id),
            api_key,
            access_token,
            Profile {
                user_id: account_id.to_string(),
                user_name: "Test User".to_string(),
                email: None,
                broker: None,
            },
        )
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Same account, same token: interchangeable for fetching
    pub fn is_equivalent(&self, other: &SessionHandle) -> bool {
        self.account_id == other.account_id && self.access_token == other.access_token
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("account_id", &self.account_id)
            .field("api_key", &self.api_key)
            .field("access_token", &"<redacted>")
            .field("user_id", &self.profile.user_id)
            .field("established_at", &self.established_at)
            .finish()
    }
}

/// Which branch of the authentication policy produced the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    CachedSession,
    FreshLogin,
}

impl fmt::Display for AuthPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPath::CachedSession => write!(f, "cached session"),
            AuthPath::FreshLogin => write!(f, "fresh login"),
        }
    }
}

/// Successful authentication
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub handle: SessionHandle,
    pub path: AuthPath,
    pub status: String,
}

impl AuthSuccess {
    pub fn new(handle: SessionHandle, path: AuthPath) -> Self {
        let status = format!("Connected: {} ({})", handle.account_id(), path);
        Self {
            handle,
            path,
            status,
        }
    }
}

/// Equity holding in the demat account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub tradingsymbol: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub pnl: f64,
}

impl Holding {
    pub fn invested_value(&self) -> f64 {
        self.average_price * self.quantity
    }

    pub fn current_value(&self) -> f64 {
        self.last_price * self.quantity
    }
}

/// Executed trade for the current day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    #[serde(default)]
    pub order_id: String,
    pub tradingsymbol: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub fill_timestamp: Option<String>,
}

/// Mutual fund units held in a folio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutualFundHolding {
    #[serde(default)]
    pub folio: Option<String>,
    #[serde(default)]
    pub fund: String,
    pub tradingsymbol: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub pnl: f64,
}

/// Everything fetched for one account in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub holdings: Vec<Holding>,
    pub trades: Vec<Trade>,
    pub mf_holdings: Vec<MutualFundHolding>,
}
