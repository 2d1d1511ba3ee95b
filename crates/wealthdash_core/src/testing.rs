//! In-memory port implementations for use case tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::entities::{
    AccountCredential, AccountId, Holding, MutualFundHolding, Profile, SessionGrant,
    SessionHandle, Trade,
};
use crate::error::{BrokerError, Error};
use crate::portfolio::Worksheet;
use crate::ports::{BrokerAuthenticator, CredentialStore, PortfolioSource, SpreadsheetExporter};

#[derive(Default)]
pub struct MockCredentialStore {
    pub credentials: Mutex<Vec<AccountCredential>>,
    pub fail_load: bool,
    pub fail_writes: bool,
    pub writes: AtomicUsize,
}

impl MockCredentialStore {
    pub fn with(credentials: Vec<AccountCredential>) -> Self {
        Self {
            credentials: Mutex::new(credentials),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Vec<AccountCredential> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn access_token(&self, id: &str) -> Option<String> {
        self.snapshot()
            .into_iter()
            .find(|c| c.account_id.as_str() == id)
            .map(|c| c.access_token)
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn load_credentials(&self) -> Result<Vec<AccountCredential>, Error> {
        if self.fail_load {
            return Err(Error::Configuration("config.json not found".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn save_credentials(&self, credentials: &[AccountCredential]) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Error::Persistence("read-only".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.credentials.lock().unwrap() = credentials.to_vec();
        Ok(())
    }

    async fn update_session_token(&self, account_id: &AccountId, token: &str) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Error::Persistence("read-only".to_string()));
        }
        let mut credentials = self.credentials.lock().unwrap();
        let credential = credentials
            .iter_mut()
            .find(|c| &c.account_id == account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.clone()))?;
        credential.access_token = token.to_string();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Broker that accepts a fixed set of access tokens and request tokens
#[derive(Default)]
pub struct MockBroker {
    /// access tokens that pass the profile check
    pub live_tokens: Mutex<HashSet<String>>,
    /// request token -> issued access token (`None` issues an empty grant)
    pub grants: HashMap<String, Option<String>>,
    pub exchange_delay: Option<Duration>,
    /// access tokens whose profile check never answers
    pub hanging_tokens: HashSet<String>,
    pub exchange_calls: Mutex<Vec<(String, String, String)>>,
    pub verify_calls: AtomicUsize,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_live_token(self, token: &str) -> Self {
        self.live_tokens.lock().unwrap().insert(token.to_string());
        self
    }

    /// `request_token` exchanges to `access_token`, which then verifies
    pub fn with_grant(mut self, request_token: &str, access_token: &str) -> Self {
        self.grants
            .insert(request_token.to_string(), Some(access_token.to_string()));
        self.with_live_token(access_token)
    }

    /// `request_token` exchanges to `access_token`, which fails verification
    pub fn with_dead_grant(mut self, request_token: &str, access_token: &str) -> Self {
        self.grants
            .insert(request_token.to_string(), Some(access_token.to_string()));
        self
    }

    pub fn with_hanging_token(mut self, access_token: &str) -> Self {
        self.hanging_tokens.insert(access_token.to_string());
        self
    }

    pub fn with_empty_grant(mut self, request_token: &str) -> Self {
        self.grants.insert(request_token.to_string(), None);
        self
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.lock().unwrap().len()
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.exchange_count() + self.verify_count()
    }
}

#[async_trait]
impl BrokerAuthenticator for MockBroker {
    async fn exchange_login_token(
        &self,
        api_key: &str,
        login_token: &str,
        api_secret: &str,
    ) -> Result<SessionGrant, Error> {
        self.exchange_calls.lock().unwrap().push((
            api_key.to_string(),
            login_token.to_string(),
            api_secret.to_string(),
        ));
        if let Some(delay) = self.exchange_delay {
            tokio::time::sleep(delay).await;
        }
        match self.grants.get(login_token) {
            Some(access_token) => Ok(SessionGrant {
                access_token: access_token.clone(),
                user_id: Some("AB1234".to_string()),
            }),
            None => Err(Error::Broker(BrokerError::Token(
                "Token is invalid or has expired.".to_string(),
            ))),
        }
    }

    async fn verify_session(&self, _api_key: &str, access_token: &str) -> Result<Profile, Error> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging_tokens.contains(access_token) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.live_tokens.lock().unwrap().contains(access_token) {
            Ok(Profile {
                user_id: "AB1234".to_string(),
                user_name: "Test User".to_string(),
                email: None,
                broker: Some("ZERODHA".to_string()),
            })
        } else {
            Err(Error::Broker(BrokerError::Token(
                "Incorrect `api_key` or `access_token`.".to_string(),
            )))
        }
    }
}

/// Portfolio source serving canned rows per account
#[derive(Default)]
pub struct MockPortfolio {
    pub holdings: HashMap<String, Vec<Holding>>,
    pub trades: HashMap<String, Vec<Trade>>,
    pub failing: HashSet<String>,
    /// accounts whose mutual fund call alone fails
    pub failing_mf: HashSet<String>,
}

impl MockPortfolio {
    pub fn with_holdings(mut self, id: &str, holdings: Vec<Holding>) -> Self {
        self.holdings.insert(id.to_string(), holdings);
        self
    }

    pub fn with_trades(mut self, id: &str, trades: Vec<Trade>) -> Self {
        self.trades.insert(id.to_string(), trades);
        self
    }

    pub fn failing_for(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn failing_mf_for(mut self, id: &str) -> Self {
        self.failing_mf.insert(id.to_string());
        self
    }

    fn check(&self, session: &SessionHandle) -> Result<(), Error> {
        if self.failing.contains(session.account_id().as_str()) {
            return Err(Error::Broker(BrokerError::Token(
                "Token is invalid or has expired.".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioSource for MockPortfolio {
    async fn holdings(&self, session: &SessionHandle) -> Result<Vec<Holding>, Error> {
        self.check(session)?;
        Ok(self
            .holdings
            .get(session.account_id().as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn trades(&self, session: &SessionHandle) -> Result<Vec<Trade>, Error> {
        self.check(session)?;
        Ok(self
            .trades
            .get(session.account_id().as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn mf_holdings(&self, session: &SessionHandle) -> Result<Vec<MutualFundHolding>, Error> {
        self.check(session)?;
        if self.failing_mf.contains(session.account_id().as_str()) {
            return Err(Error::Network("mf down".to_string()));
        }
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MockExporter {
    pub written: Mutex<Vec<Worksheet>>,
    pub fail: bool,
}

impl MockExporter {
    pub fn titles(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.title.clone())
            .collect()
    }
}

#[async_trait]
impl SpreadsheetExporter for MockExporter {
    async fn replace_worksheet(&self, worksheet: &Worksheet) -> Result<(), Error> {
        if self.fail {
            return Err(Error::Export("quota exceeded".to_string()));
        }
        self.written.lock().unwrap().push(worksheet.clone());
        Ok(())
    }
}

pub fn holding(symbol: &str, quantity: f64, average_price: f64, last_price: f64) -> Holding {
    Holding {
        tradingsymbol: symbol.to_string(),
        exchange: "NSE".to_string(),
        isin: None,
        quantity,
        average_price,
        last_price,
        pnl: (last_price - average_price) * quantity,
    }
}

pub fn trade(trade_id: &str) -> Trade {
    Trade {
        trade_id: trade_id.to_string(),
        order_id: format!("O{}", trade_id),
        tradingsymbol: "INFY".to_string(),
        exchange: "NSE".to_string(),
        transaction_type: "BUY".to_string(),
        quantity: 1.0,
        average_price: 1500.0,
        fill_timestamp: None,
    }
}
