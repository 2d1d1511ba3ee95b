use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use wealthdash_core::config::BrokerSettings;
use wealthdash_core::entities::{
    Holding, MutualFundHolding, Profile, SessionGrant, SessionHandle, Trade,
};
use wealthdash_core::ports::{BrokerAuthenticator, PortfolioSource};
use wealthdash_core::{BrokerError, Error};

use crate::network::build_broker_client;

const KITE_VERSION: &str = "3";

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    message: Option<String>,
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    access_token: Option<String>,
    user_id: Option<String>,
}

/// Kite Connect REST client: token exchange, profile check and portfolio reads
pub struct KiteConnectBroker {
    client: Client,
    base_url: String,
    login_url: String,
}

impl KiteConnectBroker {
    pub fn new(settings: &BrokerSettings) -> Result<Self, Error> {
        let client = build_broker_client(settings.timeout())?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            login_url: settings.login_url.clone(),
        })
    }

    /// Browser URL where the user logs in and receives a request token
    pub fn login_url(&self, api_key: &str) -> Result<Url, Error> {
        Url::parse_with_params(&self.login_url, &[("v", KITE_VERSION), ("api_key", api_key)])
            .map_err(|e| Error::Configuration(format!("invalid login url: {}", e)))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[instrument(skip(self, session), fields(account_id = %session.account_id()))]
    async fn get<T: DeserializeOwned>(&self, path: &str, session: &SessionHandle) -> Result<T, Error> {
        self.get_with_token(path, session.api_key(), session.access_token())
            .await
    }

    async fn get_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        api_key: &str,
        access_token: &str,
    ) -> Result<T, Error> {
        debug!(path, "broker request");
        let response = self
            .client
            .get(self.endpoint(path))
            .header("X-Kite-Version", KITE_VERSION)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}:{}", api_key, access_token),
            )
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} request failed: {}", path, e)))?;

        read_envelope(response).await
    }
}

/// Decode the envelope, turning error envelopes into typed broker errors
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("failed to read broker response: {}", e)))?;

    let envelope: Envelope<T> = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(Error::InvalidServerResponse(format!(
                "unexpected broker response: {}",
                e
            )));
        }
        Err(_) => {
            return Err(Error::Network(format!("broker returned HTTP {}", status)));
        }
    };

    if envelope.status != "success" || !status.is_success() {
        let message = envelope
            .message
            .unwrap_or_else(|| format!("HTTP {}", status));
        let error = BrokerError::from_error_type(envelope.error_type.as_deref(), &message);
        warn!(http_status = %status, error = %error, "broker returned an error");
        return Err(Error::Broker(error));
    }

    envelope
        .data
        .ok_or_else(|| Error::InvalidServerResponse("success response without data".to_string()))
}

/// `hex(sha256(api_key + request_token + api_secret))`
fn session_checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl BrokerAuthenticator for KiteConnectBroker {
    #[instrument(skip(self, login_token, api_secret))]
    async fn exchange_login_token(
        &self,
        api_key: &str,
        login_token: &str,
        api_secret: &str,
    ) -> Result<SessionGrant, Error> {
        let checksum = session_checksum(api_key, login_token, api_secret);
        let form = [
            ("api_key", api_key),
            ("request_token", login_token),
            ("checksum", checksum.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint("/session/token"))
            .header("X-Kite-Version", KITE_VERSION)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Network(format!("token exchange request failed: {}", e)))?;

        let data: SessionData = read_envelope(response).await?;
        info!(user_id = ?data.user_id, "request token exchanged");
        Ok(SessionGrant {
            access_token: data.access_token,
            user_id: data.user_id,
        })
    }

    #[instrument(skip(self, access_token))]
    async fn verify_session(&self, api_key: &str, access_token: &str) -> Result<Profile, Error> {
        self.get_with_token("/user/profile", api_key, access_token)
            .await
    }
}

#[async_trait]
impl PortfolioSource for KiteConnectBroker {
    async fn holdings(&self, session: &SessionHandle) -> Result<Vec<Holding>, Error> {
        self.get("/portfolio/holdings", session).await
    }

    async fn trades(&self, session: &SessionHandle) -> Result<Vec<Trade>, Error> {
        self.get("/trades", session).await
    }

    async fn mf_holdings(&self, session: &SessionHandle) -> Result<Vec<MutualFundHolding>, Error> {
        self.get("/mf/holdings", session).await
    }
}
