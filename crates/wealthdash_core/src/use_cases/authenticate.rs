use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::entities::{AccountCredential, AuthPath, AuthSuccess, SessionHandle};
use crate::error::{AuthFailure, Error};
use crate::ports::{BrokerAuthenticator, CredentialStore};

/// Default bound for each broker round-trip made while authenticating
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of trying the cached access token. A rejection is not an error
/// for the caller: the flow continues with a fresh login.
#[derive(Debug)]
pub enum CachedAttempt {
    Verified(SessionHandle),
    Rejected(String),
    Absent,
}

/// Turns a configured account into a verified session:
/// - Cached access token, verified by a profile round-trip
/// - Otherwise request token exchange, then profile verification
/// - Newly issued access token written back to the credential store
pub struct AuthenticateAccountUseCase<C, B>
where
    C: CredentialStore,
    B: BrokerAuthenticator,
{
    credential_store: Arc<C>,
    authenticator: Arc<B>,
    timeout: Duration,
}

impl<C, B> AuthenticateAccountUseCase<C, B>
where
    C: CredentialStore,
    B: BrokerAuthenticator,
{
    pub fn new(credential_store: Arc<C>, authenticator: Arc<B>) -> Self {
        Self {
            credential_store,
            authenticator,
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authenticate one account.
    ///
    /// Flow:
    /// 1. With `prefer_cached_session`, verify the cached access token; done if live
    /// 2. Pick the request token: caller-supplied if non-empty, else the configured one
    /// 3. Exchange it for an access token using the API secret
    /// 4. Verify the new access token
    /// 5. Persist it (failure is logged, the session stands)
    ///
    /// A failed attempt never writes to the credential store.
    #[instrument(skip(self, credential, caller_login_token), fields(account_id = %credential.account_id))]
    pub async fn execute(
        &self,
        credential: &AccountCredential,
        caller_login_token: Option<&str>,
        prefer_cached_session: bool,
    ) -> Result<AuthSuccess, AuthFailure> {
        if !credential.has_api_credentials() {
            return Err(AuthFailure::MissingCredentials);
        }

        if prefer_cached_session {
            match self.try_cached_session(credential).await {
                CachedAttempt::Verified(handle) => {
                    info!("reusing cached access token");
                    return Ok(AuthSuccess::new(handle, AuthPath::CachedSession));
                }
                CachedAttempt::Rejected(reason) => {
                    debug!(%reason, "cached access token rejected, falling back to request token");
                }
                CachedAttempt::Absent => {}
            }
        }

        let login_token = resolve_login_token(caller_login_token, credential)
            .ok_or(AuthFailure::LoginTokenRequired)?;

        let grant = self
            .bounded(
                "token exchange",
                self.authenticator.exchange_login_token(
                    &credential.api_key,
                    login_token,
                    &credential.secret_api_key,
                ),
            )
            .await
            .map_err(|e| AuthFailure::AuthExchangeFailed(e.to_string()))?;

        let access_token = grant
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthFailure::SessionTokenMissing)?;

        let handle = self
            .verify(credential, &access_token)
            .await
            .map_err(|e| AuthFailure::SessionVerificationFailed(e.to_string()))?;

        if let Err(e) = self
            .credential_store
            .update_session_token(&credential.account_id, &access_token)
            .await
        {
            warn!(error = %e, "failed to persist access token, session remains valid");
        }

        info!("fresh login succeeded");
        Ok(AuthSuccess::new(handle, AuthPath::FreshLogin))
    }

    /// Verify the cached access token, if there is one
    pub async fn try_cached_session(&self, credential: &AccountCredential) -> CachedAttempt {
        let Some(token) = credential.cached_session_token() else {
            return CachedAttempt::Absent;
        };

        match self.verify(credential, token).await {
            Ok(handle) => CachedAttempt::Verified(handle),
            Err(e) => CachedAttempt::Rejected(e.to_string()),
        }
    }

    async fn verify(
        &self,
        credential: &AccountCredential,
        access_token: &str,
    ) -> Result<SessionHandle, Error> {
        let profile = self
            .bounded(
                "session verification",
                self.authenticator
                    .verify_session(&credential.api_key, access_token),
            )
            .await?;

        Ok(SessionHandle::verified(
            credential.account_id.clone(),
            &credential.api_key,
            access_token,
            profile,
        ))
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout(what.to_string()))?
    }
}

/// Caller-supplied token wins when non-blank; the configured one is the fallback
fn resolve_login_token<'a>(
    caller_login_token: Option<&'a str>,
    credential: &'a AccountCredential,
) -> Option<&'a str> {
    caller_login_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| credential.stored_login_token())
}
