use std::fmt;

use thiserror::Error;

use crate::entities::AccountId;

/// Error classes reported by the broker in its `error_type` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Session expired or invalidated, or the request token was rejected
    Token(String),
    /// Missing or malformed parameters
    Input(String),
    /// Not permitted for this account or app
    Permission(String),
    /// Broker could not reach its upstream (exchange, OMS)
    Network(String),
    /// Order placement or modification failure
    Order(String),
    /// Internal data error on the broker side
    Data(String),
    General(String),
}

impl BrokerError {
    /// Map the broker's `error_type` and `message` to a typed error
    pub fn from_error_type(error_type: Option<&str>, message: &str) -> Self {
        let message = message.to_string();
        match error_type.unwrap_or_default() {
            "TokenException" => Self::Token(message),
            "InputException" => Self::Input(message),
            "PermissionException" | "UserException" | "TwoFAException" => {
                Self::Permission(message)
            }
            "NetworkException" => Self::Network(message),
            "OrderException" | "MarginException" | "HoldingException" => Self::Order(message),
            "DataException" => Self::Data(message),
            _ => Self::General(message),
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(msg) => write!(f, "token rejected: {}", msg),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Permission(msg) => write!(f, "permission denied: {}", msg),
            Self::Network(msg) => write!(f, "broker upstream unavailable: {}", msg),
            Self::Order(msg) => write!(f, "order error: {}", msg),
            Self::Data(msg) => write!(f, "broker data error: {}", msg),
            Self::General(msg) => write!(f, "{}", msg),
        }
    }
}

/// Terminal outcome of a single authentication attempt.
///
/// These are values returned to the caller, never panics; the caller decides
/// whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("API key or secret missing from account configuration")]
    MissingCredentials,

    #[error("request token required")]
    LoginTokenRequired,

    #[error("token exchange failed: {0}")]
    AuthExchangeFailed(String),

    #[error("token exchange returned no access token")]
    SessionTokenMissing,

    #[error("session verification failed: {0}")]
    SessionVerificationFailed(String),
}

impl AuthFailure {
    /// Stable machine-readable kind for the calling layer
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::LoginTokenRequired => "login_token_required",
            Self::AuthExchangeFailed(_) => "auth_exchange_failed",
            Self::SessionTokenMissing => "session_token_missing",
            Self::SessionVerificationFailed(_) => "session_verification_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to persist credentials: {0}")]
    Persistence(String),

    #[error("account '{0}' not found")]
    AccountNotFound(AccountId),

    #[error("network error: {0}")]
    Network(String),

    #[error("broker error: {0}")]
    Broker(BrokerError),

    #[error("invalid response from server: {0}")]
    InvalidServerResponse(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
