//! Application state shared by every host: the credential store, the live
//! session registry, the activity log and the daily export scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::activity::{ActivityEntry, ActivityLog};
use crate::entities::{AccountCredential, AccountId, AuthSuccess, SessionHandle};
use crate::error::Error;
use crate::portfolio::{fetch_account_snapshot, AccountFetch, AggregatedPortfolio};
use crate::ports::{BrokerAuthenticator, CredentialStore, PortfolioSource, SpreadsheetExporter};
use crate::registry::SessionRegistry;
use crate::scheduler::DailyScheduler;
use crate::use_cases::{AuthenticateAccountUseCase, SyncPortfolioUseCase, SyncReport};

/// Per-account fetches plus their aggregation
#[derive(Debug)]
pub struct DashboardData {
    pub accounts: Vec<AccountFetch>,
    pub aggregated: AggregatedPortfolio,
}

pub struct DashboardService<C, B, P, X>
where
    C: CredentialStore,
    B: BrokerAuthenticator,
    P: PortfolioSource,
    X: SpreadsheetExporter,
{
    credentials: Arc<C>,
    authenticate: AuthenticateAccountUseCase<C, B>,
    sync: Arc<SyncPortfolioUseCase<P, X>>,
    registry: Arc<RwLock<SessionRegistry>>,
    activity: Arc<Mutex<ActivityLog>>,
    scheduler: DailyScheduler,
    auto_reconnect_done: AtomicBool,
}

impl<C, B, P, X> DashboardService<C, B, P, X>
where
    C: CredentialStore + 'static,
    B: BrokerAuthenticator + 'static,
    P: PortfolioSource + 'static,
    X: SpreadsheetExporter + 'static,
{
    pub fn new(
        credentials: Arc<C>,
        authenticate: AuthenticateAccountUseCase<C, B>,
        sync: SyncPortfolioUseCase<P, X>,
    ) -> Self {
        Self {
            credentials,
            authenticate,
            sync: Arc::new(sync),
            registry: Arc::new(RwLock::new(SessionRegistry::new())),
            activity: Arc::new(Mutex::new(ActivityLog::new())),
            scheduler: DailyScheduler::new(),
            auto_reconnect_done: AtomicBool::new(false),
        }
    }

    /// Configured accounts. A load failure is recorded and yields an empty list.
    pub async fn load_accounts(&self) -> Vec<AccountCredential> {
        match self.credentials.load_credentials().await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "failed to load accounts");
                self.record(format!("Failed to load accounts: {}", e)).await;
                Vec::new()
            }
        }
    }

    /// Authenticate one configured account and register its session.
    ///
    /// Every attempt leaves exactly one activity entry.
    #[instrument(skip(self, caller_login_token))]
    pub async fn connect(
        &self,
        account_id: &AccountId,
        caller_login_token: Option<&str>,
        prefer_cached_session: bool,
    ) -> Result<AuthSuccess, Error> {
        let credential = match self.find_credential(account_id).await {
            Ok(credential) => credential,
            Err(e) => {
                self.record(format!("Login failed for {}: {}", account_id, e))
                    .await;
                return Err(e);
            }
        };

        match self
            .authenticate
            .execute(&credential, caller_login_token, prefer_cached_session)
            .await
        {
            Ok(success) => {
                self.registry
                    .write()
                    .await
                    .register(account_id.clone(), success.handle.clone());
                self.record(success.status.clone()).await;
                Ok(success)
            }
            Err(failure) => {
                warn!(kind = failure.kind(), error = %failure, "authentication failed");
                self.record(format!("Login failed for {}: {}", account_id, failure))
                    .await;
                Err(failure.into())
            }
        }
    }

    /// Drop the live session, if any. The stored credential is untouched.
    pub async fn disconnect(&self, account_id: &AccountId) -> bool {
        let removed = self.registry.write().await.unregister(account_id).is_some();
        if removed {
            info!(%account_id, "disconnected");
            self.record(format!("Disconnected: {}", account_id)).await;
        }
        removed
    }

    /// Reconnect every account with a cached access token.
    ///
    /// Runs once per service lifetime; later calls return an empty list.
    pub async fn auto_reconnect(&self) -> Vec<(AccountId, Result<AuthSuccess, Error>)> {
        if self.auto_reconnect_done.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        let mut outcomes = Vec::new();
        for credential in self.load_accounts().await {
            if credential.cached_session_token().is_none() {
                continue;
            }
            let id = credential.account_id.clone();
            let outcome = self.connect(&id, None, true).await;
            outcomes.push((id, outcome));
        }
        info!(attempted = outcomes.len(), "auto-reconnect finished");
        outcomes
    }

    pub async fn is_connected(&self, account_id: &AccountId) -> bool {
        self.registry.read().await.is_connected(account_id)
    }

    pub async fn connected_accounts(&self) -> Vec<AccountId> {
        self.registry
            .read()
            .await
            .all()
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Activity entries, most recent first
    pub async fn activity(&self) -> Vec<ActivityEntry> {
        self.activity.lock().await.entries()
    }

    /// Fetch every connected account and aggregate the results
    pub async fn fetch_dashboard(&self) -> DashboardData {
        let sessions = self.sessions().await;
        let mut accounts = Vec::with_capacity(sessions.len());
        for session in &sessions {
            let fetch = fetch_account_snapshot(self.sync.portfolio().as_ref(), session).await;
            if let Some(e) = fetch.error() {
                warn!(account_id = %fetch.account_id, error = %e, "fetch failed");
            }
            if let Some(e) = &fetch.mf_error {
                warn!(account_id = %fetch.account_id, error = %e, "mutual fund fetch failed");
            }
            accounts.push(fetch);
        }
        let aggregated = AggregatedPortfolio::from_fetches(&accounts);
        DashboardData {
            accounts,
            aggregated,
        }
    }

    /// Export every connected account now
    pub async fn sync_now(&self) -> SyncReport {
        run_sync(self.sync.as_ref(), self.registry.as_ref(), self.activity.as_ref()).await
    }

    /// Start the daily export. Returns `false` if no account is connected or
    /// it was already running.
    pub async fn start_scheduler(&self, run_at: NaiveTime) -> bool {
        if self.registry.read().await.is_empty() {
            warn!("scheduler not started, no connected accounts");
            self.record("Connect at least one account to start scheduler").await;
            return false;
        }

        let sync = self.sync.clone();
        let registry = self.registry.clone();
        let activity = self.activity.clone();

        let started = self
            .scheduler
            .start(run_at, move || {
                let sync = sync.clone();
                let registry = registry.clone();
                let activity = activity.clone();
                async move {
                    run_sync(sync.as_ref(), registry.as_ref(), activity.as_ref()).await;
                }
            })
            .await;

        if started {
            self.record(format!("Scheduler started, daily at {}", run_at.format("%H:%M")))
                .await;
        }
        started
    }

    pub async fn stop_scheduler(&self) {
        if self.scheduler.is_running() {
            self.scheduler.stop().await;
            self.record("Scheduler stopped").await;
        }
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler.is_running()
    }

    async fn sessions(&self) -> Vec<SessionHandle> {
        self.registry
            .read()
            .await
            .all()
            .into_iter()
            .map(|(_, handle)| handle)
            .collect()
    }

    async fn find_credential(&self, account_id: &AccountId) -> Result<AccountCredential, Error> {
        self.credentials
            .load_credentials()
            .await?
            .into_iter()
            .find(|c| &c.account_id == account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.clone()))
    }

    async fn record(&self, message: impl Into<String>) {
        self.activity.lock().await.record(message);
    }
}

async fn run_sync<P, X>(
    sync: &SyncPortfolioUseCase<P, X>,
    registry: &RwLock<SessionRegistry>,
    activity: &Mutex<ActivityLog>,
) -> SyncReport
where
    P: PortfolioSource,
    X: SpreadsheetExporter,
{
    let sessions: Vec<SessionHandle> = registry
        .read()
        .await
        .all()
        .into_iter()
        .map(|(_, handle)| handle)
        .collect();

    let report = sync.execute(&sessions).await;

    let mut log = activity.lock().await;
    for note in &report.notes {
        log.record(note.clone());
    }
    report
}
