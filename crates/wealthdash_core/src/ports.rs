use async_trait::async_trait;

use crate::entities::{
    AccountCredential, AccountId, Holding, MutualFundHolding, Profile, SessionGrant,
    SessionHandle, Trade,
};
use crate::error::Error;
use crate::portfolio::Worksheet;

// ============================================================================
// Authentication Ports
// ============================================================================

/// Persisted account configuration (API keys and cached tokens)
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load every configured account
    async fn load_credentials(&self) -> Result<Vec<AccountCredential>, Error>;

    /// Replace the whole account set
    async fn save_credentials(&self, credentials: &[AccountCredential]) -> Result<(), Error>;

    /// Overwrite the cached access token of one existing account.
    /// Fails without writing anything if the account is not configured.
    async fn update_session_token(&self, account_id: &AccountId, token: &str)
        -> Result<(), Error>;
}

/// Token exchange and verification against the broker
#[async_trait]
pub trait BrokerAuthenticator: Send + Sync {
    /// Exchange a one-time request token for an access token
    async fn exchange_login_token(
        &self,
        api_key: &str,
        login_token: &str,
        api_secret: &str,
    ) -> Result<SessionGrant, Error>;

    /// Fetch the profile with an access token; succeeds only if the token is live
    async fn verify_session(&self, api_key: &str, access_token: &str) -> Result<Profile, Error>;
}

// ============================================================================
// Data Ports
// ============================================================================

/// Portfolio data reachable through a live session
#[async_trait]
pub trait PortfolioSource: Send + Sync {
    async fn holdings(&self, session: &SessionHandle) -> Result<Vec<Holding>, Error>;

    async fn trades(&self, session: &SessionHandle) -> Result<Vec<Trade>, Error>;

    async fn mf_holdings(&self, session: &SessionHandle) -> Result<Vec<MutualFundHolding>, Error>;
}

/// Spreadsheet the daily export writes into
#[async_trait]
pub trait SpreadsheetExporter: Send + Sync {
    /// Create the worksheet if missing, clear it, and write header plus rows
    async fn replace_worksheet(&self, worksheet: &Worksheet) -> Result<(), Error>;
}
